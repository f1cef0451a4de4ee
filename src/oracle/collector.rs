//! Round collection across independent feeds.
//!
//! Polls every configured source concurrently and returns the observations
//! for one asset and one logical round. A failing feed is dropped from the
//! round; the round only fails when fewer than `min_sources` remain.

use futures::future::join_all;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::oracle::sources::{PriceObservation, PriceSource};

/// Collects one round of observations
pub struct SourceCollector {
    sources: Vec<Arc<dyn PriceSource>>,
    min_sources: usize,
}

impl SourceCollector {
    /// Create a collector over `sources`
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, min_sources: usize) -> Self {
        Self {
            sources,
            min_sources,
        }
    }

    /// Number of configured feeds
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Fetch from all feeds for `asset_id`
    pub async fn collect(&self, asset_id: &str) -> Result<Vec<PriceObservation>> {
        let fetches = self.sources.iter().map(|source| source.fetch(asset_id));
        let results = join_all(fetches).await;

        let mut observations = Vec::with_capacity(results.len());
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(obs) if obs.asset_id() == asset_id => observations.push(obs),
                Ok(obs) => {
                    return Err(Error::MixedAssets {
                        expected: asset_id.to_string(),
                        got: obs.asset_id().to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(source = %source.id(), asset = asset_id, error = %e, "price source failed");
                }
            }
        }

        if observations.len() < self.min_sources {
            return Err(Error::InsufficientSources {
                got: observations.len(),
                need: self.min_sources,
            });
        }

        tracing::debug!(asset = asset_id, count = observations.len(), "collected observations");
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::StaticPriceSource;

    fn source(id: &str, asset: &str, price: u64) -> Arc<dyn PriceSource> {
        Arc::new(StaticPriceSource::new(id, asset, price).at(1_700_000_000))
    }

    #[tokio::test]
    async fn test_collect_round() {
        let collector = SourceCollector::new(
            vec![source("a", "NVDA", 100), source("b", "NVDA", 101)],
            2,
        );
        let obs = collector.collect("NVDA").await.unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].source_id().as_str(), "a");
    }

    #[tokio::test]
    async fn test_failed_feed_drops_below_minimum() {
        let collector = SourceCollector::new(
            vec![source("a", "NVDA", 100), source("b", "TSLA", 101)],
            2,
        );
        let err = collector.collect("NVDA").await.unwrap_err();
        assert_eq!(err, Error::InsufficientSources { got: 1, need: 2 });
    }
}
