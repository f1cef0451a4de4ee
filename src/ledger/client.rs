//! Ledger client interface.
//!
//! Everything the publisher and audit tooling need from a ledger node. All
//! calls are network I/O on a real deployment and may fail transiently;
//! callers classify errors with [`Error::is_transient`](crate::error::Error::is_transient).

use async_trait::async_trait;

use crate::error::Result;
use crate::ledger::transaction::{AttestationTx, SignedTransaction, TxRef, TxStatus};
use crate::ledger::verifier::{AttestationMetadata, PriceRecord};
use crate::utils::crypto::PublicKey;
use crate::zkp::consensus::ProofDigest;

/// Async access to a ledger hosting the attestation verifier
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Dry-run a transaction as `signer` would submit it
    ///
    /// Returns `Err(Error::Rejected(_))` for a would-be rejection; nothing
    /// is persisted either way.
    async fn simulate(&self, tx: &AttestationTx, signer: &PublicKey) -> Result<()>;

    /// Submit a signed transaction
    ///
    /// Re-broadcasting an identical transaction returns the existing
    /// reference without executing it again.
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxRef>;

    /// Current status of a broadcast transaction
    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus>;

    /// Latest attested price for an asset
    async fn last_price(&self, asset_id: &str) -> Result<Option<PriceRecord>>;

    /// Price attested for an asset at an exact timestamp
    async fn price_at(&self, asset_id: &str, timestamp: u64) -> Result<Option<PriceRecord>>;

    /// Audit metadata of an attestation
    async fn attestation_metadata(&self, attestation_id: u64) -> Result<Option<AttestationMetadata>>;

    /// Whether an attestation was recorded as verified
    async fn is_attestation_verified(&self, attestation_id: u64) -> Result<bool>;

    /// Commitment recorded with an attestation
    async fn attestation_commitment(&self, attestation_id: u64) -> Result<Option<Vec<u8>>>;

    /// Whether a proof digest has been accepted
    async fn is_proof_used(&self, digest: &ProofDigest) -> Result<bool>;

    /// Claimed timestamp at which a proof was first accepted
    async fn proof_usage_timestamp(&self, digest: &ProofDigest) -> Result<Option<u64>>;
}
