//! Consensus proof construction.
//!
//! [`ConsensusProofBuilder::build`] turns one round of observations into a
//! [`ConsensusProof`]:
//!
//! 1. at least two observations, all for the same asset
//! 2. local tolerance check (fails fast, before any proving cost)
//! 3. `prove` through the configured [`ProofSystem`]
//! 4. `verify_full` locally before the proof can ever be transmitted
//!
//! Proof generation failures are never retried here; a new round is a
//! caller decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::oracle::sources::PriceObservation;
use crate::utils::constants::{MAX_TOLERANCE_BPS, MIN_PRICE_SOURCES};
use crate::utils::crypto::Hash;
use crate::utils::math::{check_tolerance, PriceScale};
use crate::zkp::circuits::OUTPUT_INDEX_PRICE;
use crate::zkp::prover::{ProofSystem, ProveRequest};

// ═══════════════════════════════════════════════════════════════════════════════
// PROOF DIGEST
// ═══════════════════════════════════════════════════════════════════════════════

/// Keccak256 of the raw proof bytes; the proof's identity for replay protection
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProofDigest(Hash);

impl ProofDigest {
    /// Digest of `proof_bytes`
    pub fn of(proof_bytes: &[u8]) -> Self {
        Self(Hash::keccak256(proof_bytes))
    }

    /// Wrap an already computed digest
    pub fn from_hash(hash: Hash) -> Self {
        Self(hash)
    }

    /// Underlying hash
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Hex string
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Debug for ProofDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofDigest({})", self.0.short())
    }
}

impl fmt::Display for ProofDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSENSUS PROOF
// ═══════════════════════════════════════════════════════════════════════════════

/// A locally verified proof that independent prices agree, with its declared average
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusProof {
    asset_id: String,
    averaged_price: u64,
    timestamp: u64,
    proof_bytes: Vec<u8>,
    public_inputs: Vec<u64>,
    proof_digest: ProofDigest,
}

impl ConsensusProof {
    /// Asset the proof attests
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Declared average, in output decimals, exactly as the circuit output it
    pub fn averaged_price(&self) -> u64 {
        self.averaged_price
    }

    /// Round timestamp (latest observation time)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Opaque proof bytes
    pub fn proof_bytes(&self) -> &[u8] {
        &self.proof_bytes
    }

    /// Declared public inputs
    pub fn public_inputs(&self) -> &[u64] {
        &self.public_inputs
    }

    /// Keccak256 of the proof bytes
    pub fn proof_digest(&self) -> &ProofDigest {
        &self.proof_digest
    }

    /// The ledger-convention price this proof supports
    pub fn claimed_price(&self, scale: &PriceScale) -> Result<u64> {
        scale.to_price(self.averaged_price)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds consensus proofs from rounds of observations
pub struct ConsensusProofBuilder {
    proof_system: Arc<dyn ProofSystem>,
}

impl ConsensusProofBuilder {
    /// Create a builder on top of a proof system
    pub fn new(proof_system: Arc<dyn ProofSystem>) -> Self {
        Self { proof_system }
    }

    /// Build a consensus proof for one round
    pub async fn build(
        &self,
        observations: &[PriceObservation],
        tolerance_bps: u64,
    ) -> Result<ConsensusProof> {
        if observations.len() < MIN_PRICE_SOURCES {
            return Err(Error::InsufficientSources {
                got: observations.len(),
                need: MIN_PRICE_SOURCES,
            });
        }

        if tolerance_bps > MAX_TOLERANCE_BPS {
            return Err(Error::InvalidParameter {
                name: "tolerance_bps".into(),
                reason: format!("{} exceeds {}", tolerance_bps, MAX_TOLERANCE_BPS),
            });
        }

        let asset_id = observations[0].asset_id();
        if let Some(other) = observations.iter().find(|o| o.asset_id() != asset_id) {
            return Err(Error::MixedAssets {
                expected: asset_id.to_string(),
                got: other.asset_id().to_string(),
            });
        }

        let prices: Vec<u64> = observations.iter().map(|o| o.scaled_price()).collect();
        let spread = check_tolerance(&prices, tolerance_bps)?;
        tracing::debug!(
            asset = asset_id,
            diff = spread.diff,
            allowed = spread.allowed,
            "sources agree, proving"
        );

        let request = ProveRequest {
            asset_id: asset_id.to_string(),
            prices,
            tolerance_bps,
        };
        let output = self.proof_system.prove(&request).await.map_err(|e| {
            tracing::error!(asset = asset_id, error = %e, "proof generation failed");
            match e {
                Error::ProofGenerationFailed(_) => e,
                other => Error::ProofGenerationFailed(other.to_string()),
            }
        })?;

        if !self
            .proof_system
            .verify_full(&output.proof_bytes, &output.public_inputs)
            .await
        {
            tracing::error!(asset = asset_id, "generated proof failed local verification");
            return Err(Error::LocalVerificationFailed);
        }

        let averaged_price = *output
            .public_inputs
            .get(OUTPUT_INDEX_PRICE)
            .ok_or_else(|| Error::ProofGenerationFailed("proof declares no public output".into()))?;

        let timestamp = observations
            .iter()
            .map(|o| o.observed_at())
            .max()
            .unwrap_or_default();

        let proof_digest = ProofDigest::of(&output.proof_bytes);
        tracing::info!(
            asset = asset_id,
            averaged_price,
            timestamp,
            digest = %proof_digest.as_hash().short(),
            "consensus proof built"
        );

        Ok(ConsensusProof {
            asset_id: asset_id.to_string(),
            averaged_price,
            timestamp,
            proof_bytes: output.proof_bytes,
            public_inputs: output.public_inputs,
            proof_digest,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::SourceId;
    use crate::zkp::prover::{NativeProofSystem, ProofOutput, ProverBackend};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps the native system, counting calls and optionally misbehaving
    #[derive(Default)]
    struct CountingProofSystem {
        inner: NativeProofSystem,
        prove_calls: AtomicUsize,
        fail_prove: bool,
        fail_verify: bool,
    }

    #[async_trait]
    impl ProofSystem for CountingProofSystem {
        fn backend(&self) -> ProverBackend {
            ProverBackend::External
        }

        async fn prove(&self, request: &ProveRequest) -> Result<ProofOutput> {
            self.prove_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_prove {
                return Err(Error::Internal("prover crashed".into()));
            }
            self.inner.prove(request).await
        }

        async fn verify_full(&self, proof_bytes: &[u8], public_inputs: &[u64]) -> bool {
            !self.fail_verify && self.inner.verify_full(proof_bytes, public_inputs).await
        }
    }

    fn obs(source: &str, price: u64, at: u64) -> PriceObservation {
        PriceObservation::new("NVDA", price, at, SourceId::new(source))
    }

    #[tokio::test]
    async fn test_build_reference_round() {
        let builder = ConsensusProofBuilder::new(Arc::new(NativeProofSystem::default()));
        let proof = builder
            .build(&[obs("a", 3_000_000_000, 100), obs("b", 3_010_000_000, 105)], 700)
            .await
            .unwrap();

        assert_eq!(proof.asset_id(), "NVDA");
        assert_eq!(proof.averaged_price(), 30_050);
        assert_eq!(proof.averaged_price(), proof.public_inputs()[0]);
        assert_eq!(proof.timestamp(), 105);
        assert_eq!(proof.proof_digest(), &ProofDigest::of(proof.proof_bytes()));
        assert_eq!(proof.claimed_price(&PriceScale::default()).unwrap(), 3_005_000_000);
    }

    #[tokio::test]
    async fn test_insufficient_sources() {
        let builder = ConsensusProofBuilder::new(Arc::new(NativeProofSystem::default()));
        let err = builder.build(&[obs("a", 1, 1)], 700).await.unwrap_err();
        assert_eq!(err, Error::InsufficientSources { got: 1, need: 2 });
    }

    #[tokio::test]
    async fn test_mixed_assets() {
        let builder = ConsensusProofBuilder::new(Arc::new(NativeProofSystem::default()));
        let other = PriceObservation::new("TSLA", 100, 1, SourceId::new("b"));
        let err = builder.build(&[obs("a", 100, 1), other], 700).await.unwrap_err();
        assert!(matches!(err, Error::MixedAssets { .. }));
    }

    #[tokio::test]
    async fn test_tolerance_above_ceiling_never_reaches_prover() {
        let system = Arc::new(CountingProofSystem::default());
        let builder = ConsensusProofBuilder::new(system.clone());
        let round = [obs("a", 1, 1), obs("b", u64::MAX, 1)];

        for tolerance_bps in [MAX_TOLERANCE_BPS + 1, 20_000, u64::MAX] {
            let err = builder.build(&round, tolerance_bps).await.unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "tolerance_bps"));
        }
        assert_eq!(system.prove_calls.load(Ordering::SeqCst), 0);

        // The ceiling itself is accepted
        let proof = builder
            .build(&[obs("a", 100_000_000, 1), obs("b", 150_000_000, 1)], MAX_TOLERANCE_BPS)
            .await
            .unwrap();
        assert_eq!(proof.averaged_price(), 1_250);
        assert_eq!(system.prove_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prover_failure_not_retried() {
        let system = Arc::new(CountingProofSystem {
            fail_prove: true,
            ..Default::default()
        });
        let builder = ConsensusProofBuilder::new(system.clone());
        let err = builder
            .build(&[obs("a", 100, 1), obs("b", 100, 1)], 700)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProofGenerationFailed(_)));
        assert_eq!(system.prove_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_verification_failure() {
        let system = Arc::new(CountingProofSystem {
            fail_verify: true,
            ..Default::default()
        });
        let builder = ConsensusProofBuilder::new(system);
        let err = builder
            .build(&[obs("a", 100, 1), obs("b", 100, 1)], 700)
            .await
            .unwrap_err();
        assert_eq!(err, Error::LocalVerificationFailed);
    }

    proptest! {
        #[test]
        fn prop_build_respects_tolerance(
            p1 in 1_000u64..100_000_000_000,
            delta_bps in 0u64..2_000,
            tolerance_bps in 0u64..1_000,
        ) {
            let p2 = p1 + p1 * delta_bps / 10_000;
            let system = Arc::new(CountingProofSystem::default());
            let builder = ConsensusProofBuilder::new(system.clone());
            let result = tokio_test::block_on(
                builder.build(&[obs("a", p1, 10), obs("b", p2, 11)], tolerance_bps),
            );

            let allowed = p2 as u128 * tolerance_bps as u128 / 10_000;
            if (p2 - p1) as u128 <= allowed {
                let proof = result.unwrap();
                prop_assert_eq!(proof.averaged_price(), proof.public_inputs()[0]);
                prop_assert_eq!(proof.averaged_price(), ((p1 as u128 + p2 as u128) / 2 / 100_000) as u64);
            } else {
                let exceeded = matches!(result, Err(Error::ToleranceExceeded { .. }));
                prop_assert!(exceeded);
                prop_assert_eq!(system.prove_calls.load(Ordering::SeqCst), 0);
            }
        }
    }
}
