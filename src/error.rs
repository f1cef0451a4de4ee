//! Error types for the zkprice attestation pipeline.
//!
//! Errors fall into four classes that drive retry behavior:
//! - input errors (too few sources, tolerance exceeded) are surfaced for a fresh round
//! - proof-oracle errors are fatal to the round and never retried automatically
//! - transient transport errors are retried with a bounded budget
//! - ledger rejections are permanent and carry a [`RejectReason`]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for zkprice operations
pub type Result<T> = std::result::Result<T, Error>;

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER REJECTION REASONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reason the ledger refused an attestation.
///
/// Every variant is permanent: resubmitting the identical payload can never
/// turn a rejection into an acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Proof payload has no bytes
    EmptyProof,
    /// Proof payload shorter than the configured minimum
    BadProofLen,
    /// Proof payload consists only of zero bytes
    ZeroProof,
    /// No declared public output
    NoPublicInput,
    /// Declared output does not match the claimed price
    PriceMismatch,
    /// Proof digest already recorded
    ProofAlreadyUsed,
    /// Transaction signer is not the configured attestor
    Unauthorized,
    /// Transaction signature does not verify
    InvalidSignature,
    /// Transaction could not be decoded
    Malformed,
}

impl RejectReason {
    /// Stable numeric code, mirrors the ledger contract's error enum
    pub fn code(&self) -> u32 {
        match self {
            RejectReason::EmptyProof => 1,
            RejectReason::BadProofLen => 2,
            RejectReason::ZeroProof => 3,
            RejectReason::NoPublicInput => 4,
            RejectReason::PriceMismatch => 5,
            RejectReason::ProofAlreadyUsed => 6,
            RejectReason::Unauthorized => 7,
            RejectReason::InvalidSignature => 8,
            RejectReason::Malformed => 9,
        }
    }

    /// Reason code as it appears in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::EmptyProof => "empty_proof",
            RejectReason::BadProofLen => "bad_proof_len",
            RejectReason::ZeroProof => "zero_proof",
            RejectReason::NoPublicInput => "no_public_input",
            RejectReason::PriceMismatch => "price_mismatch",
            RejectReason::ProofAlreadyUsed => "proof_already_used",
            RejectReason::Unauthorized => "unauthorized",
            RejectReason::InvalidSignature => "invalid_signature",
            RejectReason::Malformed => "malformed",
        }
    }

    /// Structural rejections come from the payload shape alone
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RejectReason::EmptyProof
                | RejectReason::BadProofLen
                | RejectReason::ZeroProof
                | RejectReason::NoPublicInput
        )
    }

    /// Rejections that indicate a stale/duplicate round or tampering
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            RejectReason::PriceMismatch | RejectReason::ProofAlreadyUsed
        )
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Main error type for zkprice
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Consensus Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Fewer observations than the consensus rule requires
    #[error("Insufficient price sources: got {got}, need {need}")]
    InsufficientSources {
        /// Number of observations provided
        got: usize,
        /// Number of observations required
        need: usize,
    },

    /// Spread between sources exceeds the tolerance band
    #[error("Tolerance exceeded: spread {diff} > allowed {allowed} ({tolerance_bps} bps of {max_price})")]
    ToleranceExceeded {
        /// max - min of observed prices
        diff: u64,
        /// Largest allowed spread
        allowed: u64,
        /// Highest observed price
        max_price: u64,
        /// Tolerance in basis points
        tolerance_bps: u64,
    },

    /// Observations in one round disagree on the asset
    #[error("Mixed assets in one round: expected {expected}, got {got}")]
    MixedAssets {
        /// Asset of the first observation
        expected: String,
        /// Offending asset
        got: String,
    },

    /// The external prover returned an error
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// The freshly generated proof did not pass full local verification
    #[error("Local proof verification failed")]
    LocalVerificationFailed,

    /// A price source could not produce an observation
    #[error("Price source {source_id} failed: {details}")]
    SourceUnavailable {
        /// Source identifier
        source_id: String,
        /// Error details
        details: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Commitment Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Asset identifier cannot be encoded as a field element
    #[error("Invalid asset identifier {asset}: {reason}")]
    InvalidAsset {
        /// Asset identifier
        asset: String,
        /// Why it was refused
        reason: String,
    },

    /// Two configured assets share an encoding
    #[error("Asset encoding collision between {first} and {second}")]
    AssetCollision {
        /// First asset
        first: String,
        /// Second asset
        second: String,
    },

    /// Arithmetic hash failed
    #[error("Commitment hash failed: {0}")]
    CommitmentHash(String),

    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Ledger refused the attestation
    #[error("Ledger rejected attestation: {0}")]
    Rejected(RejectReason),

    /// Network failure talking to the ledger node
    #[error("Transport error: {0}")]
    Transport(String),

    /// Ledger node temporarily unavailable
    #[error("Ledger node unavailable: {0}")]
    NodeUnavailable(String),

    /// Simulation hit resource contention
    #[error("Resource contention during simulation: {0}")]
    ResourceContention(String),

    // ═══════════════════════════════════════════════════════════════════
    // Crypto Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Cryptographic operation failed
    #[error("Crypto error in {operation}: {details}")]
    CryptoError {
        /// Operation that failed
        operation: String,
        /// Error details
        details: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns true if an identical retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::NodeUnavailable(_) | Error::ResourceContention(_)
        )
    }

    /// Ledger rejection reason, if any
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Error::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::Internal(_) | Error::Overflow { .. } | Error::Storage(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Consensus errors: 1xxx
            Error::InsufficientSources { .. } => 1001,
            Error::ToleranceExceeded { .. } => 1002,
            Error::MixedAssets { .. } => 1003,
            Error::ProofGenerationFailed(_) => 1004,
            Error::LocalVerificationFailed => 1005,
            Error::SourceUnavailable { .. } => 1006,

            // Commitment errors: 2xxx
            Error::InvalidAsset { .. } => 2001,
            Error::AssetCollision { .. } => 2002,
            Error::CommitmentHash(_) => 2003,

            // Ledger errors: 3xxx, rejections 31xx
            Error::Rejected(reason) => 3100 + reason.code(),
            Error::Transport(_) => 3001,
            Error::NodeUnavailable(_) => 3002,
            Error::ResourceContention(_) => 3003,

            // Crypto errors: 4xxx
            Error::CryptoError { .. } => 4001,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Overflow { .. } => 5002,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
            Error::Storage(_) => 9002,
        }
    }
}

impl From<RejectReason> for Error {
    fn from(reason: RejectReason) -> Self {
        Error::Rejected(reason)
    }
}
