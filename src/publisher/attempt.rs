//! Submission attempt bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RejectReason;
use crate::ledger::transaction::TxRef;
use crate::utils::crypto::Hash;
use crate::zkp::commitment::Commitment;
use crate::zkp::consensus::ConsensusProof;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Publisher-local attempt identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Hash);

impl AttemptId {
    /// Derive from the commitment and the publisher's attempt counter
    pub fn derive(commitment: &Commitment, counter: u64) -> Self {
        let mut data = commitment.to_bytes();
        data.extend_from_slice(commitment.proof_digest().as_bytes());
        data.extend_from_slice(&counter.to_be_bytes());
        Self(Hash::blake3(&data))
    }

    /// Underlying hash
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0.short())
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.short())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Why an attempt ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Ledger refused the payload; permanent
    Rejected(RejectReason),
    /// No terminal ledger status within the retry budget or poll deadline
    SubmissionTimeout,
    /// Local failure before anything was broadcast
    Internal(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Rejected(reason) => write!(f, "rejected: {}", reason),
            FailureReason::SubmissionTimeout => f.write_str("submission timeout"),
            FailureReason::Internal(msg) => write!(f, "internal: {}", msg),
        }
    }
}

/// Lifecycle of one attempt; `Confirmed` and `Failed` are terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    /// Created, nothing sent yet
    Pending,
    /// Broadcast, awaiting a terminal ledger status
    Submitted,
    /// Ledger accepted the attestation
    Confirmed {
        /// Attestation id assigned by the ledger
        attestation_id: u64,
    },
    /// Attempt ended without acceptance
    Failed(FailureReason),
}

impl AttemptStatus {
    /// Whether this status can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Confirmed { .. } | AttemptStatus::Failed(_))
    }

    /// Failure reason, if failed
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            AttemptStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTEMPT
// ═══════════════════════════════════════════════════════════════════════════════

/// One publish call's view of a submission; never seen by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationAttempt {
    attempt_id: AttemptId,
    commitment: Commitment,
    proof: ConsensusProof,
    public_inputs: Vec<u64>,
    status: AttemptStatus,
    ledger_tx_ref: Option<TxRef>,
    retry_count: u32,
}

impl AttestationAttempt {
    pub(crate) fn new(attempt_id: AttemptId, commitment: Commitment, proof: ConsensusProof) -> Self {
        let public_inputs = proof.public_inputs().to_vec();
        Self {
            attempt_id,
            commitment,
            proof,
            public_inputs,
            status: AttemptStatus::Pending,
            ledger_tx_ref: None,
            retry_count: 0,
        }
    }

    /// Attempt identifier
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    /// Commitment being published
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Proof being published
    pub fn proof(&self) -> &ConsensusProof {
        &self.proof
    }

    /// Public inputs sent with the proof
    pub fn public_inputs(&self) -> &[u64] {
        &self.public_inputs
    }

    /// Current status
    pub fn status(&self) -> &AttemptStatus {
        &self.status
    }

    /// Reference of the last broadcast transaction
    ///
    /// A reference alone is not success; only `Confirmed` is.
    pub fn ledger_tx_ref(&self) -> Option<TxRef> {
        self.ledger_tx_ref
    }

    /// Automatic retries performed
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether the ledger accepted the attestation
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, AttemptStatus::Confirmed { .. })
    }

    pub(crate) fn mark_submitted(&mut self, tx_ref: TxRef) {
        self.ledger_tx_ref = Some(tx_ref);
        self.status = AttemptStatus::Submitted;
    }

    pub(crate) fn record_retry(&mut self) {
        self.retry_count += 1;
    }

    pub(crate) fn finish(&mut self, status: AttemptStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
    }
}
