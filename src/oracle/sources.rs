//! Price source definitions and interfaces.
//!
//! A [`PriceSource`] is one independent market-data feed. Provider-specific
//! HTTP clients live outside this crate and plug in through the trait;
//! [`StaticPriceSource`] serves fixed quotes for development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE IDENTIFIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifier of one independent feed (e.g. "alphavantage", "finnhub")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE OBSERVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// One scaled price reading from one feed. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    asset_id: String,
    scaled_price: u64,
    observed_at: u64,
    source_id: SourceId,
}

impl PriceObservation {
    /// Create a new observation
    pub fn new(
        asset_id: impl Into<String>,
        scaled_price: u64,
        observed_at: u64,
        source_id: SourceId,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            scaled_price,
            observed_at,
            source_id,
        }
    }

    /// Asset this price is for
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Price in source decimals
    pub fn scaled_price(&self) -> u64 {
        self.scaled_price
    }

    /// Unix seconds when the feed was read
    pub fn observed_at(&self) -> u64 {
        self.observed_at
    }

    /// Feed that produced this reading
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// An independent price feed
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable identifier of this feed
    fn id(&self) -> SourceId;

    /// Fetch the current scaled price for `asset_id`
    async fn fetch(&self, asset_id: &str) -> Result<PriceObservation>;
}

/// Feed that returns a fixed quote, stamped with the current time
#[derive(Debug, Clone)]
pub struct StaticPriceSource {
    id: SourceId,
    asset_id: String,
    scaled_price: u64,
    observed_at: Option<u64>,
}

impl StaticPriceSource {
    /// Create a source quoting `scaled_price` for `asset_id`
    pub fn new(id: impl Into<String>, asset_id: impl Into<String>, scaled_price: u64) -> Self {
        Self {
            id: SourceId::new(id),
            asset_id: asset_id.into(),
            scaled_price,
            observed_at: None,
        }
    }

    /// Pin the observation timestamp
    pub fn at(mut self, observed_at: u64) -> Self {
        self.observed_at = Some(observed_at);
        self
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn id(&self) -> SourceId {
        self.id.clone()
    }

    async fn fetch(&self, asset_id: &str) -> Result<PriceObservation> {
        if asset_id != self.asset_id {
            return Err(Error::SourceUnavailable {
                source_id: self.id.to_string(),
                details: format!("no quote for {}", asset_id),
            });
        }
        Ok(PriceObservation::new(
            asset_id,
            self.scaled_price,
            self.observed_at.unwrap_or_else(unix_now),
            self.id.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticPriceSource::new("feed-a", "NVDA", 1_800_000_000).at(1_700_000_000);
        let obs = source.fetch("NVDA").await.unwrap();

        assert_eq!(obs.asset_id(), "NVDA");
        assert_eq!(obs.scaled_price(), 1_800_000_000);
        assert_eq!(obs.observed_at(), 1_700_000_000);
        assert_eq!(obs.source_id().as_str(), "feed-a");
    }

    #[tokio::test]
    async fn test_static_source_unknown_asset() {
        let source = StaticPriceSource::new("feed-a", "NVDA", 1);
        let err = source.fetch("TSLA").await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
