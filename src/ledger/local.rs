//! In-process ledger hosting the attestation verifier.
//!
//! Executes transactions at broadcast time, in submission order, against an
//! [`OnChainVerifier`]. Transaction statuses are kept in memory; verifier
//! state lives in the configured [`StorageBackend`], so a `FileStore`
//! backed ledger keeps its replay records across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Error, RejectReason, Result};
use crate::ledger::client::LedgerClient;
use crate::ledger::transaction::{AttestationTx, SignedTransaction, TxRef, TxStatus};
use crate::ledger::verifier::{
    AttestationMetadata, OnChainVerifier, PriceRecord, SubmissionContext, Verdict, VerifierConfig,
};
use crate::storage::{FileStore, InMemoryStore, StorageBackend};
use crate::utils::crypto::{Hash, PublicKey};
use crate::zkp::consensus::ProofDigest;

#[derive(Debug, Clone, Copy)]
struct TxEntry {
    status: TxStatus,
    pending_polls: u32,
}

/// Single-node ledger with one authorized attestor
pub struct LocalLedger<S: StorageBackend = InMemoryStore> {
    verifier: OnChainVerifier<S>,
    attestor: PublicKey,
    sequence: AtomicU64,
    txs: Mutex<HashMap<TxRef, TxEntry>>,
    confirmation_polls: u32,
}

impl LocalLedger<InMemoryStore> {
    /// Ephemeral ledger
    pub fn in_memory(attestor: PublicKey, config: VerifierConfig) -> Result<Self> {
        Self::new(InMemoryStore::new(), attestor, config)
    }
}

impl LocalLedger<FileStore> {
    /// Ledger persisted under `dir`
    pub fn open<P: AsRef<Path>>(dir: P, attestor: PublicKey, config: VerifierConfig) -> Result<Self> {
        Self::new(FileStore::new(dir)?, attestor, config)
    }
}

impl<S: StorageBackend> LocalLedger<S> {
    /// Create a ledger over a storage backend
    pub fn new(backend: S, attestor: PublicKey, config: VerifierConfig) -> Result<Self> {
        let verifier = OnChainVerifier::new(backend, config)?;
        let next = verifier.latest_attestation_id()?.unwrap_or(0);
        Ok(Self {
            verifier,
            attestor,
            sequence: AtomicU64::new(next),
            txs: Mutex::new(HashMap::new()),
            confirmation_polls: 0,
        })
    }

    /// Report `Pending` for the first `polls` status reads of each transaction
    pub fn with_confirmation_delay(mut self, polls: u32) -> Self {
        self.confirmation_polls = polls;
        self
    }

    /// The hosted verifier
    pub fn verifier(&self) -> &OnChainVerifier<S> {
        &self.verifier
    }

    /// Authorized attestor key
    pub fn attestor(&self) -> &PublicKey {
        &self.attestor
    }

    /// Submit a bincode-encoded [`SignedTransaction`]
    ///
    /// Undecodable bytes are recorded as `Failed(Malformed)` under
    /// `sha256(bytes)`.
    pub fn broadcast_raw(&self, bytes: &[u8]) -> Result<TxRef> {
        let tx_ref = TxRef::new(Hash::sha256(bytes));
        let mut txs = self
            .txs
            .lock()
            .map_err(|e| Error::Internal(format!("Lock error: {}", e)))?;

        if txs.contains_key(&tx_ref) {
            tracing::debug!(tx_ref = %tx_ref.as_hash().short(), "duplicate broadcast");
            return Ok(tx_ref);
        }

        let status = match bincode::deserialize::<SignedTransaction>(bytes) {
            Ok(signed) => self.execute(&signed)?,
            Err(e) => {
                tracing::warn!(tx_ref = %tx_ref.as_hash().short(), error = %e, "malformed transaction");
                TxStatus::Failed(RejectReason::Malformed)
            }
        };

        txs.insert(
            tx_ref,
            TxEntry {
                status,
                pending_polls: self.confirmation_polls,
            },
        );
        Ok(tx_ref)
    }

    fn authorize(&self, signer: &PublicKey) -> Option<RejectReason> {
        if signer != &self.attestor {
            return Some(RejectReason::Unauthorized);
        }
        None
    }

    fn execute(&self, signed: &SignedTransaction) -> Result<TxStatus> {
        if let Some(reason) = self.authorize(&signed.signer) {
            tracing::warn!(signer = %signed.signer, reason = %reason, "transaction refused");
            return Ok(TxStatus::Failed(reason));
        }
        if !signed.verify()? {
            tracing::warn!(signer = %signed.signer, "bad transaction signature");
            return Ok(TxStatus::Failed(RejectReason::InvalidSignature));
        }

        let ctx = SubmissionContext {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            submitter: signed.signer,
        };
        Ok(match self.verifier.verify_and_record(&signed.tx.payload, &ctx)? {
            Verdict::Accept(meta) => TxStatus::Success {
                attestation_id: meta.attestation_id,
            },
            Verdict::Reject(reason) => TxStatus::Failed(reason),
        })
    }
}

#[async_trait]
impl<S: StorageBackend> LedgerClient for LocalLedger<S> {
    async fn simulate(&self, tx: &AttestationTx, signer: &PublicKey) -> Result<()> {
        if let Some(reason) = self.authorize(signer) {
            return Err(Error::Rejected(reason));
        }
        match self.verifier.check(&tx.payload)? {
            Some(reason) => Err(Error::Rejected(reason)),
            None => Ok(()),
        }
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxRef> {
        let bytes = bincode::serialize(tx).map_err(|e| Error::Serialization(e.to_string()))?;
        self.broadcast_raw(&bytes)
    }

    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
        let mut txs = self
            .txs
            .lock()
            .map_err(|e| Error::Internal(format!("Lock error: {}", e)))?;
        Ok(match txs.get_mut(tx_ref) {
            None => TxStatus::NotFound,
            Some(entry) if entry.pending_polls > 0 => {
                entry.pending_polls -= 1;
                TxStatus::Pending
            }
            Some(entry) => entry.status,
        })
    }

    async fn last_price(&self, asset_id: &str) -> Result<Option<PriceRecord>> {
        self.verifier.last_price(asset_id)
    }

    async fn price_at(&self, asset_id: &str, timestamp: u64) -> Result<Option<PriceRecord>> {
        self.verifier.price_at(asset_id, timestamp)
    }

    async fn attestation_metadata(&self, attestation_id: u64) -> Result<Option<AttestationMetadata>> {
        self.verifier.attestation_metadata(attestation_id)
    }

    async fn is_attestation_verified(&self, attestation_id: u64) -> Result<bool> {
        self.verifier.is_attestation_verified(attestation_id)
    }

    async fn attestation_commitment(&self, attestation_id: u64) -> Result<Option<Vec<u8>>> {
        self.verifier.attestation_commitment(attestation_id)
    }

    async fn is_proof_used(&self, digest: &ProofDigest) -> Result<bool> {
        self.verifier.is_proof_used(digest)
    }

    async fn proof_usage_timestamp(&self, digest: &ProofDigest) -> Result<Option<u64>> {
        self.verifier.proof_usage_timestamp(digest)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::verifier::AttestationPayload;
    use crate::utils::crypto::KeyPair;

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

    fn sign(keys: &KeyPair, payload: AttestationPayload) -> SignedTransaction {
        let tx = AttestationTx::new(payload);
        let signature = keys.sign(&tx.signing_digest().unwrap());
        SignedTransaction {
            tx,
            signer: *keys.public_key(),
            signature,
        }
    }

    fn ledger(keys: &KeyPair) -> LocalLedger {
        LocalLedger::in_memory(*keys.public_key(), VerifierConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_and_status() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let signed = sign(&keys, payload());

        ledger.simulate(&signed.tx, &signed.signer).await.unwrap();
        let tx_ref = ledger.broadcast(&signed).await.unwrap();
        assert_eq!(tx_ref, signed.tx_ref().unwrap());
        assert_eq!(
            ledger.tx_status(&tx_ref).await.unwrap(),
            TxStatus::Success { attestation_id: 1 }
        );

        let last = ledger.last_price("NVDA").await.unwrap().unwrap();
        assert_eq!(last.price, 3_005_000_000);
        assert!(ledger.is_attestation_verified(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_broadcast_not_reexecuted() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let signed = sign(&keys, payload());

        let a = ledger.broadcast(&signed).await.unwrap();
        let b = ledger.broadcast(&signed).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(
            ledger.tx_status(&b).await.unwrap(),
            TxStatus::Success { attestation_id: 1 }
        );
        assert!(ledger.attestation_metadata(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_simulate_reports_replay() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let signed = sign(&keys, payload());
        ledger.broadcast(&signed).await.unwrap();

        let err = ledger.simulate(&signed.tx, &signed.signer).await.unwrap_err();
        assert_eq!(err, Error::Rejected(RejectReason::ProofAlreadyUsed));
    }

    #[tokio::test]
    async fn test_foreign_signer_unauthorized() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let intruder = KeyPair::generate();
        let signed = sign(&intruder, payload());

        let err = ledger.simulate(&signed.tx, &signed.signer).await.unwrap_err();
        assert_eq!(err, Error::Rejected(RejectReason::Unauthorized));

        let tx_ref = ledger.broadcast(&signed).await.unwrap();
        assert_eq!(
            ledger.tx_status(&tx_ref).await.unwrap(),
            TxStatus::Failed(RejectReason::Unauthorized)
        );
        assert!(!ledger.is_proof_used(&ProofDigest::of(&payload().proof_bytes)).await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_signature() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let mut signed = sign(&keys, payload());
        signed.tx.payload.timestamp += 1;

        let tx_ref = ledger.broadcast(&signed).await.unwrap();
        assert_eq!(
            ledger.tx_status(&tx_ref).await.unwrap(),
            TxStatus::Failed(RejectReason::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_malformed_bytes() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys);
        let tx_ref = ledger.broadcast_raw(b"not a transaction").unwrap();
        assert_eq!(
            ledger.tx_status(&tx_ref).await.unwrap(),
            TxStatus::Failed(RejectReason::Malformed)
        );
    }

    #[tokio::test]
    async fn test_confirmation_delay() {
        let keys = KeyPair::generate();
        let ledger = ledger(&keys).with_confirmation_delay(2);
        let tx_ref = ledger.broadcast(&sign(&keys, payload())).await.unwrap();

        assert_eq!(ledger.tx_status(&tx_ref).await.unwrap(), TxStatus::Pending);
        assert_eq!(ledger.tx_status(&tx_ref).await.unwrap(), TxStatus::Pending);
        assert!(ledger.tx_status(&tx_ref).await.unwrap().is_terminal());

        let unknown = TxRef::new(Hash::sha256(b"x"));
        assert_eq!(ledger.tx_status(&unknown).await.unwrap(), TxStatus::NotFound);
    }

    #[tokio::test]
    async fn test_file_backed_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyPair::generate();
        let signed = sign(&keys, payload());
        {
            let ledger = LocalLedger::open(dir.path(), *keys.public_key(), VerifierConfig::default()).unwrap();
            ledger.broadcast(&signed).await.unwrap();
        }

        let ledger = LocalLedger::open(dir.path(), *keys.public_key(), VerifierConfig::default()).unwrap();
        assert!(ledger.is_proof_used(&ProofDigest::of(&signed.tx.payload.proof_bytes)).await.unwrap());

        let mut next = payload();
        next.proof_bytes[0] = 200;
        let tx_ref = ledger.broadcast(&sign(&keys, next)).await.unwrap();
        assert_eq!(
            ledger.tx_status(&tx_ref).await.unwrap(),
            TxStatus::Success { attestation_id: 2 }
        );
    }
}
