//! Ledger side of the pipeline.
//!
//! [`OnChainVerifier`] is the acceptance state machine the ledger runs for
//! every submission. [`LedgerClient`] is how off-chain components reach a
//! ledger; [`LocalLedger`] is the in-process implementation used by the CLI
//! and the tests.

pub mod client;
pub mod local;
pub mod transaction;
pub mod verifier;

pub use client::LedgerClient;
pub use local::LocalLedger;
pub use transaction::{AttestationTx, SignedTransaction, TxRef, TxStatus};
pub use verifier::{
    AttestationMetadata, AttestationPayload, OnChainVerifier, PriceRecord, SubmissionContext,
    UsedProofRecord, Verdict, VerifierConfig,
};
