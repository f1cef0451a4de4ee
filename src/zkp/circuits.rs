//! Consensus circuit definition.
//!
//! The consensus relation proves that a set of independently observed
//! prices agree within a tolerance band and that the declared average is
//! their floor mean, truncated to output decimals.
//!
//! ## Public outputs
//!
//! | index | value |
//! |-------|-------|
//! | 0 | averaged price in output decimals |
//! | 1 | tolerance in basis points the prices satisfied |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::{MAX_TOLERANCE_BPS, MIN_PRICE_SOURCES};
use crate::utils::crypto::Hash;
use crate::utils::math::{check_tolerance, mean_floor, PriceScale};

/// Index of the declared average in the public inputs
pub const OUTPUT_INDEX_PRICE: usize = 0;

/// Index of the tolerance in the public inputs
pub const OUTPUT_INDEX_TOLERANCE: usize = 1;

/// Number of public outputs the consensus circuit declares
pub const PUBLIC_OUTPUT_COUNT: usize = 2;

// ═══════════════════════════════════════════════════════════════════════════════
// CIRCUIT TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A circuit executed natively by the development prover
pub trait Circuit {
    /// Witness consumed by the circuit
    type Witness;
    /// Values the circuit declares publicly
    type Output;

    /// Run the constraints over the witness
    fn execute(witness: &Self::Witness) -> Result<Self::Output>;

    /// Circuit identifier
    fn circuit_id() -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSENSUS CIRCUIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Private witness of one consensus round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusWitness {
    /// Asset the prices are for
    pub asset_id: String,
    /// Observed prices in source decimals
    pub prices: Vec<u64>,
    /// Agreement band in basis points
    pub tolerance_bps: u64,
    /// Decimal conventions
    pub scale: PriceScale,
}

impl ConsensusWitness {
    /// Digest committing to the private witness
    pub fn commitment(&self) -> Hash {
        let mut data = Vec::with_capacity(self.asset_id.len() + 8 * (self.prices.len() + 1));
        data.extend_from_slice(self.asset_id.as_bytes());
        data.push(0);
        for price in &self.prices {
            data.extend_from_slice(&price.to_be_bytes());
        }
        data.extend_from_slice(&self.tolerance_bps.to_be_bytes());
        Hash::sha256(&data)
    }
}

/// Public outputs of one consensus round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusOutput {
    /// Average in output decimals
    pub averaged_price: u64,
    /// Tolerance the witness satisfied
    pub tolerance_bps: u64,
}

impl ConsensusOutput {
    /// Ordered public input vector
    pub fn to_public_inputs(&self) -> Vec<u64> {
        vec![self.averaged_price, self.tolerance_bps]
    }
}

/// The agreement-and-average relation
pub struct ConsensusCircuit;

impl Circuit for ConsensusCircuit {
    type Witness = ConsensusWitness;
    type Output = ConsensusOutput;

    fn execute(witness: &ConsensusWitness) -> Result<ConsensusOutput> {
        // Constraint 1: enough independent readings
        if witness.prices.len() < MIN_PRICE_SOURCES {
            return Err(Error::InsufficientSources {
                got: witness.prices.len(),
                need: MIN_PRICE_SOURCES,
            });
        }

        if witness.tolerance_bps > MAX_TOLERANCE_BPS {
            return Err(Error::InvalidParameter {
                name: "tolerance_bps".into(),
                reason: format!("{} exceeds {}", witness.tolerance_bps, MAX_TOLERANCE_BPS),
            });
        }

        // Constraint 2: readings agree within the band
        check_tolerance(&witness.prices, witness.tolerance_bps)?;

        // Constraint 3: declared output is the floor mean in output decimals
        let mean = mean_floor(&witness.prices).ok_or(Error::InsufficientSources {
            got: 0,
            need: MIN_PRICE_SOURCES,
        })?;

        Ok(ConsensusOutput {
            averaged_price: witness.scale.to_output(mean)?,
            tolerance_bps: witness.tolerance_bps,
        })
    }

    fn circuit_id() -> &'static str {
        "zkprice_consensus_v1"
    }
}
