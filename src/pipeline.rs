//! One attestation round, end to end.
//!
//! ```text
//! sources -> SourceCollector -> ConsensusProofBuilder -> CommitmentBinder -> AttestationPublisher
//! ```
//!
//! Stages run strictly in order. Rounds for different assets share no
//! mutable state and may run concurrently; the ledger's replay record is
//! the only cross-round guard.

use futures::future::join_all;
use std::sync::Arc;

use crate::config::AttestorConfig;
use crate::error::{Error, Result};
use crate::ledger::client::LedgerClient;
use crate::oracle::collector::SourceCollector;
use crate::oracle::sources::PriceSource;
use crate::publisher::{AttestationAttempt, AttestationPublisher, TransactionSigner};
use crate::utils::math::PriceScale;
use crate::zkp::commitment::{AssetRegistry, Commitment, CommitmentBinder};
use crate::zkp::consensus::{ConsensusProof, ConsensusProofBuilder};
use crate::zkp::prover::ProofSystem;

/// Everything one round produced
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Locally verified consensus proof
    pub proof: ConsensusProof,
    /// Commitment derived from it
    pub commitment: Commitment,
    /// Terminal publish attempt
    pub attempt: AttestationAttempt,
}

/// Wires the four stages together
pub struct AttestationPipeline {
    collector: SourceCollector,
    builder: ConsensusProofBuilder,
    binder: CommitmentBinder,
    publisher: AttestationPublisher,
    registry: Arc<AssetRegistry>,
    tolerance_bps: u64,
    scale: PriceScale,
}

impl AttestationPipeline {
    /// Build a pipeline from a validated configuration
    pub fn from_config(
        config: &AttestorConfig,
        sources: Vec<Arc<dyn PriceSource>>,
        proof_system: Arc<dyn ProofSystem>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self> {
        config.validate().map_err(|e| Error::InvalidParameter {
            name: "config".into(),
            reason: e.to_string(),
        })?;
        let registry = Arc::new(AssetRegistry::from_config(config)?);

        Ok(Self {
            collector: SourceCollector::new(sources, config.min_sources),
            builder: ConsensusProofBuilder::new(proof_system),
            binder: CommitmentBinder::new(registry.clone()),
            publisher: AttestationPublisher::new(ledger, signer, config.publisher.clone()),
            registry,
            tolerance_bps: config.tolerance_bps,
            scale: config.scale,
        })
    }

    /// The publisher, for outcome subscriptions
    pub fn publisher(&self) -> &AttestationPublisher {
        &self.publisher
    }

    /// Run one round for `asset_id`
    ///
    /// Errors before publishing (sources, consensus, commitment) abandon
    /// the round with no ledger side effects. Once publishing starts the
    /// result is always a terminal attempt.
    pub async fn run_round(&self, asset_id: &str) -> Result<RoundReport> {
        // Unknown assets fail before any feed is queried
        self.registry.code(asset_id)?;

        let observations = self.collector.collect(asset_id).await?;
        let proof = self.builder.build(&observations, self.tolerance_bps).await?;

        let price = proof.claimed_price(&self.scale)?;
        let commitment = self
            .binder
            .bind(price, proof.timestamp(), asset_id, proof.proof_digest())?;
        tracing::debug!(asset = asset_id, commitment = %commitment.value(), "commitment bound");

        let attempt = self
            .publisher
            .publish(asset_id, price, proof.timestamp(), &commitment, &proof)
            .await;

        Ok(RoundReport {
            proof,
            commitment,
            attempt,
        })
    }

    /// Run one round for every registered asset concurrently
    pub async fn run_all(&self) -> Vec<(String, Result<RoundReport>)> {
        let assets: Vec<String> = self.registry.assets().map(String::from).collect();
        let rounds = assets.iter().map(|asset| self.run_round(asset));
        let results = join_all(rounds).await;
        assets.into_iter().zip(results).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::local::LocalLedger;
    use crate::publisher::{AttemptStatus, KeySigner, PublisherConfig};
    use crate::oracle::sources::StaticPriceSource;
    use crate::zkp::prover::NativeProofSystem;

    fn config() -> AttestorConfig {
        AttestorConfig {
            assets: vec!["NVDA".into(), "TSLA".into()],
            publisher: PublisherConfig::local(),
            ..Default::default()
        }
    }

    fn pipeline(sources: Vec<Arc<dyn PriceSource>>) -> (Arc<LocalLedger>, AttestationPipeline) {
        let config = config();
        let signer = Arc::new(KeySigner::generate());
        let ledger = Arc::new(LocalLedger::in_memory(signer.public_key(), config.verifier).unwrap());
        let pipeline = AttestationPipeline::from_config(
            &config,
            sources,
            Arc::new(NativeProofSystem::new(config.scale)),
            ledger.clone(),
            signer,
        )
        .unwrap();
        (ledger, pipeline)
    }

    fn quote(id: &str, asset: &str, price: u64) -> Arc<dyn PriceSource> {
        Arc::new(StaticPriceSource::new(id, asset, price).at(1_700_000_000))
    }

    #[tokio::test]
    async fn test_run_round_records_price() {
        let (ledger, pipeline) = pipeline(vec![
            quote("a", "NVDA", 3_000_000_000),
            quote("b", "NVDA", 3_010_000_000),
        ]);

        let report = pipeline.run_round("NVDA").await.unwrap();
        assert_eq!(report.proof.averaged_price(), 30_050);
        assert_eq!(report.commitment.price(), 3_005_000_000);
        assert_eq!(report.attempt.status(), &AttemptStatus::Confirmed { attestation_id: 1 });

        let last = ledger.last_price("NVDA").await.unwrap().unwrap();
        assert_eq!(last.price, 3_005_000_000);
        assert_eq!(last.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_disagreeing_sources_abandon_round() {
        let (ledger, pipeline) = pipeline(vec![
            quote("a", "NVDA", 1_000_000_000),
            quote("b", "NVDA", 2_000_000_000),
        ]);

        let err = pipeline.run_round("NVDA").await.unwrap_err();
        assert!(matches!(err, Error::ToleranceExceeded { .. }));
        assert!(ledger.last_price("NVDA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_asset() {
        let (_, pipeline) = pipeline(vec![quote("a", "AAPL", 1), quote("b", "AAPL", 1)]);
        let err = pipeline.run_round("AAPL").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAsset { .. }));
    }

    #[tokio::test]
    async fn test_run_all_reports_every_asset() {
        let (_, pipeline) = pipeline(vec![
            quote("a", "NVDA", 3_000_000_000),
            quote("b", "NVDA", 3_010_000_000),
        ]);

        let results = pipeline.run_all().await;
        assert_eq!(results.len(), 2);
        let nvda = results.iter().find(|(asset, _)| asset == "NVDA").unwrap();
        assert!(nvda.1.as_ref().unwrap().attempt.is_confirmed());
        let tsla = results.iter().find(|(asset, _)| asset == "TSLA").unwrap();
        assert!(matches!(tsla.1, Err(Error::InsufficientSources { .. })));
    }
}
