//! Ledger transaction types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, RejectReason, Result};
use crate::ledger::verifier::AttestationPayload;
use crate::utils::crypto::{verify_signature, Hash, PublicKey, Signature};

// ═══════════════════════════════════════════════════════════════════════════════
// UNSIGNED TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Invocation of the verifier's acceptance entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationTx {
    /// Entry point arguments
    pub payload: AttestationPayload,
}

impl AttestationTx {
    /// Wrap a payload
    pub fn new(payload: AttestationPayload) -> Self {
        Self { payload }
    }

    /// Canonical bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Digest the signer commits to: `sha256(bincode(tx))`
    pub fn signing_digest(&self) -> Result<Hash> {
        Ok(Hash::sha256(&self.to_bytes()?))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNED TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A transaction with its ECDSA signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Transaction body
    pub tx: AttestationTx,
    /// Signer public key
    pub signer: PublicKey,
    /// Signature over [`AttestationTx::signing_digest`]
    pub signature: Signature,
}

impl SignedTransaction {
    /// Check the signature against the embedded signer
    pub fn verify(&self) -> Result<bool> {
        let digest = self.tx.signing_digest()?;
        Ok(verify_signature(&self.signer, &digest, &self.signature))
    }

    /// Content-addressed reference: `sha256(bincode(signed tx))`
    pub fn tx_ref(&self) -> Result<TxRef> {
        let bytes = bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(TxRef(Hash::sha256(&bytes)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE AND STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Ledger transaction reference
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxRef(Hash);

impl TxRef {
    /// Wrap a hash
    pub fn new(hash: Hash) -> Self {
        Self(hash)
    }

    /// Underlying hash
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Debug for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxRef({})", self.0.short())
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger view of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted into the mempool, not yet executed
    Pending,
    /// Unknown to the ledger
    NotFound,
    /// Executed and accepted
    Success {
        /// Attestation id assigned by the ledger
        attestation_id: u64,
    },
    /// Executed and rejected
    Failed(RejectReason),
}

impl TxStatus {
    /// Whether this status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success { .. } | TxStatus::Failed(_))
    }
}
