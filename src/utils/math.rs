//! Integer price arithmetic.
//!
//! Prices are scaled integers throughout; nothing in the attestation path
//! touches floating point. This module holds the tolerance rule shared by
//! the consensus builder and the native circuit, and the decimal rescaling
//! shared by the circuit and the ledger verifier.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, OUTPUT_DECIMALS, PRICE_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe multiplication with overflow check
pub fn safe_mul(a: u64, b: u64) -> Result<u64> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// 10^exp as u64
pub fn pow10(exp: u32) -> Result<u64> {
    10u64.checked_pow(exp).ok_or(Error::Overflow {
        operation: format!("10^{}", exp),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOLERANCE RULE
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of evaluating the agreement band over a set of prices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spread {
    /// Lowest observed price
    pub min: u64,
    /// Highest observed price
    pub max: u64,
    /// max - min
    pub diff: u64,
    /// Largest spread the tolerance permits
    pub allowed: u64,
}

impl Spread {
    /// Whether the observed spread stays inside the band
    pub fn within_tolerance(&self) -> bool {
        self.diff <= self.allowed
    }
}

/// Largest allowed spread: `max_price * tolerance_bps / 10000`, floored
///
/// Saturates at `u64::MAX` for tolerances above 100%.
pub fn allowed_spread(max_price: u64, tolerance_bps: u64) -> u64 {
    let allowed = (max_price as u128) * (tolerance_bps as u128) / (BPS_DIVISOR as u128);
    u64::try_from(allowed).unwrap_or(u64::MAX)
}

/// Compute the spread of `prices` against `tolerance_bps`
///
/// Returns `None` for an empty slice.
pub fn spread(prices: &[u64], tolerance_bps: u64) -> Option<Spread> {
    let min = *prices.iter().min()?;
    let max = *prices.iter().max()?;
    Some(Spread {
        min,
        max,
        diff: max - min,
        allowed: allowed_spread(max, tolerance_bps),
    })
}

/// Fail with `ToleranceExceeded` when the spread leaves the band
pub fn check_tolerance(prices: &[u64], tolerance_bps: u64) -> Result<Spread> {
    let s = spread(prices, tolerance_bps).ok_or(Error::InsufficientSources { got: 0, need: 1 })?;
    if !s.within_tolerance() {
        return Err(Error::ToleranceExceeded {
            diff: s.diff,
            allowed: s.allowed,
            max_price: s.max,
            tolerance_bps,
        });
    }
    Ok(s)
}

/// Floor of the arithmetic mean, computed without overflow
pub fn mean_floor(prices: &[u64]) -> Option<u64> {
    if prices.is_empty() {
        return None;
    }
    let sum: u128 = prices.iter().map(|&p| p as u128).sum();
    Some((sum / prices.len() as u128) as u64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL SCALE
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimal conventions of the two price representations in play
///
/// Source observations and ledger prices carry `price_decimals`; the
/// circuit's declared average carries `output_decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceScale {
    /// Decimals of source and claimed ledger prices
    pub price_decimals: u32,
    /// Decimals of the declared public output
    pub output_decimals: u32,
}

impl Default for PriceScale {
    fn default() -> Self {
        Self {
            price_decimals: PRICE_DECIMALS,
            output_decimals: OUTPUT_DECIMALS,
        }
    }
}

impl PriceScale {
    /// Multiplier between the two conventions
    pub fn factor(&self) -> Result<u64> {
        let exp = self
            .price_decimals
            .checked_sub(self.output_decimals)
            .ok_or_else(|| Error::InvalidParameter {
                name: "output_decimals".into(),
                reason: format!(
                    "output decimals {} exceed price decimals {}",
                    self.output_decimals, self.price_decimals
                ),
            })?;
        pow10(exp)
    }

    /// Price-decimal value to output decimals (truncating)
    pub fn to_output(&self, price: u64) -> Result<u64> {
        Ok(price / self.factor()?)
    }

    /// Output-decimal value back to price decimals
    pub fn to_price(&self, output: u64) -> Result<u64> {
        safe_mul(output, self.factor()?)
    }

    /// Human-readable decimal for a price-decimal value
    pub fn price_as_decimal(&self, price: u64) -> Decimal {
        Decimal::from_i128_with_scale(price as i128, self.price_decimals)
    }

    /// Human-readable decimal for an output-decimal value
    pub fn output_as_decimal(&self, output: u64) -> Decimal {
        Decimal::from_i128_with_scale(output as i128, self.output_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_safe_arithmetic() {
        assert_eq!(safe_mul(3, 4).unwrap(), 12);
        assert!(safe_mul(u64::MAX, 2).is_err());
        assert_eq!(pow10(5).unwrap(), 100_000);
        assert!(pow10(20).is_err());
    }

    #[test]
    fn test_tolerance_boundary() {
        // 7% of 10_000 is 700: a spread of exactly 700 passes, 701 fails
        assert!(check_tolerance(&[9_300, 10_000], 700).is_ok());
        let err = check_tolerance(&[9_299, 10_000], 700).unwrap_err();
        assert!(matches!(err, Error::ToleranceExceeded { diff: 701, allowed: 700, .. }));
    }

    #[test]
    fn test_allowed_spread_saturates() {
        assert_eq!(allowed_spread(u64::MAX, BPS_DIVISOR), u64::MAX);
        assert_eq!(allowed_spread(u64::MAX, u64::MAX), u64::MAX);
        assert_eq!(allowed_spread(u64::MAX, BPS_DIVISOR / 2), u64::MAX / 2);
        assert!(check_tolerance(&[0, u64::MAX], u64::MAX).is_ok());
    }

    #[test]
    fn test_reference_round() {
        let prices = [3_000_000_000, 3_010_000_000];
        let s = check_tolerance(&prices, 700).unwrap();
        assert_eq!(s.diff, 10_000_000);
        assert_eq!(s.allowed, 210_700_000);

        let avg = mean_floor(&prices).unwrap();
        assert_eq!(avg, 3_005_000_000);

        let scale = PriceScale::default();
        assert_eq!(scale.to_output(avg).unwrap(), 30_050);
        assert_eq!(scale.to_price(30_050).unwrap(), 3_005_000_000);
        assert_eq!(scale.output_as_decimal(30_050).to_string(), "300.50");
    }

    #[test]
    fn test_invalid_scale() {
        let scale = PriceScale { price_decimals: 2, output_decimals: 7 };
        assert!(scale.factor().is_err());
    }

    #[test]
    fn test_mean_floor() {
        assert_eq!(mean_floor(&[]), None);
        assert_eq!(mean_floor(&[1, 2]), Some(1));
        assert_eq!(mean_floor(&[u64::MAX, u64::MAX]), Some(u64::MAX));
    }

    proptest! {
        #[test]
        fn prop_tolerance_matches_definition(
            a in 1u64..10_000_000_000,
            b in 1u64..10_000_000_000,
            bps in 0u64..5_000,
        ) {
            let max = a.max(b);
            let diff = max - a.min(b);
            let allowed = (max as u128) * (bps as u128) / 10_000;
            prop_assert_eq!(check_tolerance(&[a, b], bps).is_ok(), (diff as u128) <= allowed);
            prop_assert_eq!(check_tolerance(&[b, a], bps).is_ok(), (diff as u128) <= allowed);
        }

        #[test]
        fn prop_mean_between_extremes(prices in proptest::collection::vec(0u64..u64::MAX, 1..8)) {
            let mean = mean_floor(&prices).unwrap();
            prop_assert!(mean >= *prices.iter().min().unwrap());
            prop_assert!(mean <= *prices.iter().max().unwrap());
        }
    }
}
