//! Ledger-side acceptance state machine.
//!
//! Per proof digest the only transition is `Unseen -> Recorded`, and
//! `Recorded` is permanent. Verification is structural: the verifier never
//! re-runs the proof system. It checks the payload shape, that the declared
//! output matches the claimed price, and that the proof has not been
//! accepted before.
//!
//! ## Validation order
//!
//! Short-circuits on the first failure, cheapest first:
//!
//! 1. proof bytes non-empty, at least `min_proof_len`, not all zero
//! 2. at least one declared public input
//! 3. `public_inputs[0] * 10^(price_decimals - output_decimals) == price`
//! 4. no used-proof record for `keccak256(proof_bytes)`
//!
//! Step 4 and the writes that follow acceptance happen in one guarded
//! store operation, so concurrent submissions of the same proof yield
//! exactly one acceptance.

use serde::{Deserialize, Serialize};

use crate::error::{Error, RejectReason, Result};
use crate::storage::{encode, make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::constants::{MIN_PROOF_LEN, OUTPUT_DECIMALS, PRICE_DECIMALS};
use crate::utils::crypto::PublicKey;
use crate::utils::math::PriceScale;
use crate::zkp::circuits::OUTPUT_INDEX_PRICE;
use crate::zkp::consensus::ProofDigest;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifier parameters fixed at ledger deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Smallest accepted proof payload in bytes
    pub min_proof_len: usize,
    /// Decimals of claimed prices
    pub price_decimals: u32,
    /// Decimals of the declared public output
    pub output_decimals: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_proof_len: MIN_PROOF_LEN,
            price_decimals: PRICE_DECIMALS,
            output_decimals: OUTPUT_DECIMALS,
        }
    }
}

impl VerifierConfig {
    /// Decimal conventions as a [`PriceScale`]
    pub fn scale(&self) -> PriceScale {
        PriceScale {
            price_decimals: self.price_decimals,
            output_decimals: self.output_decimals,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD AND RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Arguments of the ledger's acceptance entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationPayload {
    /// Attested asset
    pub asset_id: String,
    /// Claimed price in price decimals
    pub price: u64,
    /// Claimed timestamp (unix seconds)
    pub timestamp: u64,
    /// Serialized commitment (format tag + value)
    pub commitment: Vec<u8>,
    /// Opaque proof bytes
    pub proof_bytes: Vec<u8>,
    /// Declared public inputs
    pub public_inputs: Vec<u64>,
}

/// Replay guard entry; at most one exists per digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedProofRecord {
    /// Keccak256 of the accepted proof bytes
    pub proof_digest: ProofDigest,
    /// Claimed timestamp of the accepting submission
    pub first_seen_at: u64,
    /// Asset of the accepting submission
    pub asset_id: String,
    /// Attestation the proof was accepted in
    pub attestation_id: u64,
}

/// Attested price keyed by `(asset, timestamp)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Asset
    pub asset_id: String,
    /// Price in price decimals
    pub price: u64,
    /// Attested timestamp
    pub timestamp: u64,
    /// Attestation that recorded it
    pub attestation_id: u64,
}

/// Audit trail of one accepted attestation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationMetadata {
    /// Ledger sequence at which the attestation was recorded
    pub attestation_id: u64,
    /// Asset
    pub asset_id: String,
    /// Price in price decimals
    pub price: u64,
    /// Attested timestamp
    pub timestamp: u64,
    /// Serialized commitment
    pub commitment: Vec<u8>,
    /// Digest of the accepted proof
    pub proof_digest: ProofDigest,
    /// Key that signed the submission
    pub submitter: PublicKey,
    /// Always true for recorded attestations
    pub verified: bool,
}

/// Ledger context of one submission
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    /// Sequence number assigned to the submission
    pub sequence: u64,
    /// Authorized signer of the submission
    pub submitter: PublicKey,
}

/// Result of the acceptance entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Recorded; carries the stored metadata
    Accept(AttestationMetadata),
    /// Refused; nothing was written
    Reject(RejectReason),
}

impl Verdict {
    /// Whether the payload was recorded
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }

    /// Rejection reason, if refused
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Reject(reason) => Some(*reason),
            Verdict::Accept(_) => None,
        }
    }

    /// Metadata on accept, `Error::Rejected` otherwise
    pub fn into_result(self) -> Result<AttestationMetadata> {
        match self {
            Verdict::Accept(metadata) => Ok(metadata),
            Verdict::Reject(reason) => Err(Error::Rejected(reason)),
        }
    }
}

fn used_key(digest: &ProofDigest) -> Vec<u8> {
    make_key(prefixes::USED_PROOF, digest.as_bytes())
}

/// Length-prefixed so no asset's keys fall under another asset's prefix
fn price_prefix(asset_id: &str) -> Vec<u8> {
    let mut key = make_key(prefixes::PRICE, &(asset_id.len() as u64).to_be_bytes());
    key.extend_from_slice(asset_id.as_bytes());
    key
}

fn price_key(asset_id: &str, timestamp: u64) -> Vec<u8> {
    let mut key = price_prefix(asset_id);
    key.extend_from_slice(&timestamp.to_be_bytes());
    key
}

fn meta_key(attestation_id: u64) -> Vec<u8> {
    make_key(prefixes::META, &attestation_id.to_be_bytes())
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Structural verifier with replay protection over a key-value store
pub struct OnChainVerifier<S: StorageBackend> {
    store: TypedStore<S>,
    config: VerifierConfig,
    factor: u64,
}

impl<S: StorageBackend> OnChainVerifier<S> {
    /// Create a verifier; fails if the decimal conventions are inconsistent
    pub fn new(backend: S, config: VerifierConfig) -> Result<Self> {
        let factor = config.scale().factor()?;
        Ok(Self {
            store: TypedStore::new(backend),
            config,
            factor,
        })
    }

    /// Deployment parameters
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Run steps 1 to 4 without writing anything
    pub fn check(&self, payload: &AttestationPayload) -> Result<Option<RejectReason>> {
        if let Some(reason) = self.validate(payload) {
            return Ok(Some(reason));
        }
        if self.is_proof_used(&ProofDigest::of(&payload.proof_bytes))? {
            return Ok(Some(RejectReason::ProofAlreadyUsed));
        }
        Ok(None)
    }

    /// The acceptance entry point
    pub fn verify_and_record(
        &self,
        payload: &AttestationPayload,
        ctx: &SubmissionContext,
    ) -> Result<Verdict> {
        if let Some(reason) = self.validate(payload) {
            return Ok(self.reject(payload, reason));
        }

        let proof_digest = ProofDigest::of(&payload.proof_bytes);
        let used = UsedProofRecord {
            proof_digest,
            first_seen_at: payload.timestamp,
            asset_id: payload.asset_id.clone(),
            attestation_id: ctx.sequence,
        };
        let price = PriceRecord {
            asset_id: payload.asset_id.clone(),
            price: payload.price,
            timestamp: payload.timestamp,
            attestation_id: ctx.sequence,
        };
        let metadata = AttestationMetadata {
            attestation_id: ctx.sequence,
            asset_id: payload.asset_id.clone(),
            price: payload.price,
            timestamp: payload.timestamp,
            commitment: payload.commitment.clone(),
            proof_digest,
            submitter: ctx.submitter,
            verified: true,
        };

        let writes = vec![
            (price_key(&payload.asset_id, payload.timestamp), encode(&price)?),
            (meta_key(ctx.sequence), encode(&metadata)?),
        ];
        if !self.store.commit_if_absent(&used_key(&proof_digest), &used, writes)? {
            return Ok(self.reject(payload, RejectReason::ProofAlreadyUsed));
        }
        self.store.flush()?;

        tracing::info!(
            attestation_id = ctx.sequence,
            asset = %payload.asset_id,
            price = payload.price,
            timestamp = payload.timestamp,
            digest = %proof_digest.as_hash().short(),
            "attestation recorded"
        );

        Ok(Verdict::Accept(metadata))
    }

    /// Steps 1 to 3
    fn validate(&self, payload: &AttestationPayload) -> Option<RejectReason> {
        let proof = &payload.proof_bytes;
        if proof.is_empty() {
            return Some(RejectReason::EmptyProof);
        }
        if proof.len() < self.config.min_proof_len {
            return Some(RejectReason::BadProofLen);
        }
        if proof.iter().all(|&b| b == 0) {
            return Some(RejectReason::ZeroProof);
        }

        let declared = match payload.public_inputs.get(OUTPUT_INDEX_PRICE) {
            Some(declared) => *declared,
            None => return Some(RejectReason::NoPublicInput),
        };
        // An output that overflows when rescaled cannot equal any u64 price
        match declared.checked_mul(self.factor) {
            Some(rescaled) if rescaled == payload.price => None,
            _ => Some(RejectReason::PriceMismatch),
        }
    }

    fn reject(&self, payload: &AttestationPayload, reason: RejectReason) -> Verdict {
        tracing::warn!(
            asset = %payload.asset_id,
            reason = %reason,
            code = reason.code(),
            structural = reason.is_structural(),
            suspicious = reason.is_suspicious(),
            "attestation rejected"
        );
        Verdict::Reject(reason)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Latest attested price for an asset
    pub fn last_price(&self, asset_id: &str) -> Result<Option<PriceRecord>> {
        let latest = self.store.list_prefix(&price_prefix(asset_id))?.into_iter().max();
        match latest {
            Some(key) => self.store.get(&key),
            None => Ok(None),
        }
    }

    /// Price attested for an asset at an exact timestamp
    pub fn price_at(&self, asset_id: &str, timestamp: u64) -> Result<Option<PriceRecord>> {
        self.store.get(&price_key(asset_id, timestamp))
    }

    /// Audit metadata of an attestation
    pub fn attestation_metadata(&self, attestation_id: u64) -> Result<Option<AttestationMetadata>> {
        self.store.get(&meta_key(attestation_id))
    }

    /// Whether an attestation was recorded as verified
    pub fn is_attestation_verified(&self, attestation_id: u64) -> Result<bool> {
        Ok(self
            .attestation_metadata(attestation_id)?
            .map(|m| m.verified)
            .unwrap_or(false))
    }

    /// Commitment recorded with an attestation
    pub fn attestation_commitment(&self, attestation_id: u64) -> Result<Option<Vec<u8>>> {
        Ok(self.attestation_metadata(attestation_id)?.map(|m| m.commitment))
    }

    /// Highest recorded attestation id
    pub fn latest_attestation_id(&self) -> Result<Option<u64>> {
        let latest = self.store.list_prefix(prefixes::META)?.into_iter().max();
        Ok(latest.and_then(|key| {
            let id: [u8; 8] = key.get(prefixes::META.len()..)?.try_into().ok()?;
            Some(u64::from_be_bytes(id))
        }))
    }

    /// Replay record for a proof digest
    pub fn used_proof(&self, digest: &ProofDigest) -> Result<Option<UsedProofRecord>> {
        self.store.get(&used_key(digest))
    }

    /// Whether a proof digest has been accepted
    pub fn is_proof_used(&self, digest: &ProofDigest) -> Result<bool> {
        self.store.exists(&used_key(digest))
    }

    /// Claimed timestamp at which a proof was first accepted
    pub fn proof_usage_timestamp(&self, digest: &ProofDigest) -> Result<Option<u64>> {
        Ok(self.used_proof(digest)?.map(|r| r.first_seen_at))
    }
}

impl<S: StorageBackend> std::fmt::Debug for OnChainVerifier<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnChainVerifier")
            .field("config", &self.config)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::utils::crypto::KeyPair;

    fn verifier() -> OnChainVerifier<InMemoryStore> {
        OnChainVerifier::new(InMemoryStore::new(), VerifierConfig::default()).unwrap()
    }

    fn payload() -> AttestationPayload {
        AttestationPayload {
            asset_id: "NVDA".into(),
            price: 3_005_000_000,
            timestamp: 1_700_000_000,
            commitment: vec![1; 33],
            proof_bytes: (1..=85u8).collect(),
            public_inputs: vec![30_050, 700],
        }
    }

    fn ctx(sequence: u64) -> SubmissionContext {
        SubmissionContext {
            sequence,
            submitter: *KeyPair::generate().public_key(),
        }
    }

    #[test]
    fn test_accept_then_replay() {
        let v = verifier();
        let first = v.verify_and_record(&payload(), &ctx(1)).unwrap();
        assert!(first.is_accept());

        let second = v.verify_and_record(&payload(), &ctx(2)).unwrap();
        assert_eq!(second, Verdict::Reject(RejectReason::ProofAlreadyUsed));
        assert!(v.attestation_metadata(2).unwrap().is_none());
    }

    #[test]
    fn test_records_written_on_accept() {
        let v = verifier();
        let p = payload();
        v.verify_and_record(&p, &ctx(7)).unwrap();

        let digest = ProofDigest::of(&p.proof_bytes);
        assert!(v.is_proof_used(&digest).unwrap());
        assert_eq!(v.proof_usage_timestamp(&digest).unwrap(), Some(p.timestamp));
        assert_eq!(v.used_proof(&digest).unwrap().unwrap().asset_id, "NVDA");

        let price = v.price_at("NVDA", p.timestamp).unwrap().unwrap();
        assert_eq!(price.price, 3_005_000_000);
        assert_eq!(price.attestation_id, 7);

        let meta = v.attestation_metadata(7).unwrap().unwrap();
        assert!(meta.verified);
        assert_eq!(meta.proof_digest, digest);
        assert!(v.is_attestation_verified(7).unwrap());
        assert_eq!(v.attestation_commitment(7).unwrap(), Some(p.commitment));
    }

    #[test]
    fn test_structural_rejections() {
        let v = verifier();
        let reject = |p: AttestationPayload| v.verify_and_record(&p, &ctx(1)).unwrap().reject_reason();

        let mut p = payload();
        p.proof_bytes.clear();
        assert_eq!(reject(p), Some(RejectReason::EmptyProof));

        let mut p = payload();
        p.proof_bytes.truncate(63);
        assert_eq!(reject(p), Some(RejectReason::BadProofLen));

        let mut p = payload();
        p.proof_bytes = vec![0; 128];
        assert_eq!(reject(p), Some(RejectReason::ZeroProof));

        let mut p = payload();
        p.public_inputs.clear();
        assert_eq!(reject(p), Some(RejectReason::NoPublicInput));

        let mut p = payload();
        p.price += 1;
        assert_eq!(reject(p), Some(RejectReason::PriceMismatch));

        let mut p = payload();
        p.public_inputs[0] = u64::MAX;
        assert_eq!(reject(p), Some(RejectReason::PriceMismatch));

        assert!(v.last_price("NVDA").unwrap().is_none());
    }

    #[test]
    fn test_check_is_dry_run() {
        let v = verifier();
        assert_eq!(v.check(&payload()).unwrap(), None);
        assert!(!v.is_proof_used(&ProofDigest::of(&payload().proof_bytes)).unwrap());

        v.verify_and_record(&payload(), &ctx(1)).unwrap();
        assert_eq!(v.check(&payload()).unwrap(), Some(RejectReason::ProofAlreadyUsed));
    }

    #[test]
    fn test_last_price_picks_latest_timestamp() {
        let v = verifier();
        for (i, ts) in [300u64, 100, 200].iter().enumerate() {
            let mut p = payload();
            p.timestamp = *ts;
            p.proof_bytes[0] = i as u8 + 100;
            assert!(v.verify_and_record(&p, &ctx(i as u64 + 1)).unwrap().is_accept());
        }

        assert_eq!(v.last_price("NVDA").unwrap().unwrap().timestamp, 300);
        assert!(v.last_price("NVD").unwrap().is_none());
    }

    #[test]
    fn test_price_keys_isolated_per_asset() {
        let v = verifier();
        // Assets that extend one another, including with a NUL separator
        for (i, asset) in ["A\0B", "AB", "A"].iter().enumerate() {
            let mut p = payload();
            p.asset_id = asset.to_string();
            p.timestamp = 1_000 - i as u64;
            p.proof_bytes[0] = i as u8 + 100;
            assert!(v.verify_and_record(&p, &ctx(i as u64 + 1)).unwrap().is_accept());
        }

        let a = v.last_price("A").unwrap().unwrap();
        assert_eq!(a.asset_id, "A");
        assert_eq!(a.timestamp, 998);
        assert_eq!(v.last_price("A\0B").unwrap().unwrap().timestamp, 1_000);
        assert_eq!(v.last_price("AB").unwrap().unwrap().timestamp, 999);
        assert!(v.price_at("A", 1_000).unwrap().is_none());
    }

    #[test]
    fn test_concurrent_replay_single_accept() {
        use std::sync::Arc;

        let v = Arc::new(verifier());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let v = v.clone();
                std::thread::spawn(move || v.verify_and_record(&payload(), &ctx(i + 1)).unwrap())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(Verdict::is_accept)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_inconsistent_decimals_refused() {
        let config = VerifierConfig {
            output_decimals: 9,
            ..Default::default()
        };
        assert!(OnChainVerifier::new(InMemoryStore::new(), config).is_err());
    }
}
