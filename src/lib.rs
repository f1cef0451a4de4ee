//! # zkprice
//!
//! Price attestation with zero-knowledge consensus proofs.
//!
//! Independent price feeds are read for one asset, a proof is produced that
//! the readings agree within a tolerance band and that a declared average
//! was computed from them, and the averaged price is published to a ledger
//! together with a Poseidon commitment binding price, time, asset and proof.
//!
//! ## Architecture
//!
//! - **Oracle**: independent price feeds and round collection
//! - **ZKP**: consensus proof builder, proof system interface, commitments
//! - **Publisher**: signs, submits and tracks attestations to a terminal status
//! - **Ledger**: the structural verifier with replay protection, client interface
//! - **Storage**: key-value backends with a guarded multi-key write
//!
//! ## Example
//!
//! ```rust,ignore
//! use zkprice::prelude::*;
//!
//! let pipeline = AttestationPipeline::from_config(&config, sources, prover, ledger, signer)?;
//! let report = pipeline.run_round("NVDA").await?;
//! assert!(report.attempt.is_confirmed());
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod pipeline;
pub mod publisher;
pub mod storage;
pub mod utils;
pub mod zkp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AttestorConfig, ConfigError};
    pub use crate::error::{Error, RejectReason, Result};
    pub use crate::ledger::{
        AttestationPayload, LedgerClient, LocalLedger, OnChainVerifier, TxRef, TxStatus, Verdict,
        VerifierConfig,
    };
    pub use crate::oracle::{PriceObservation, PriceSource, SourceCollector, StaticPriceSource};
    pub use crate::pipeline::{AttestationPipeline, RoundReport};
    pub use crate::publisher::{
        AttemptStatus, AttestationAttempt, AttestationPublisher, FailureReason, KeySigner,
        PublisherConfig, TransactionSigner,
    };
    pub use crate::utils::{
        crypto::{Hash, KeyPair, PublicKey, Signature},
        math::PriceScale,
    };
    pub use crate::zkp::{
        AssetRegistry, Commitment, CommitmentBinder, ConsensusProof, ConsensusProofBuilder,
        NativeProofSystem, ProofDigest, ProofSystem,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const PROTOCOL_NAME: &str = "zkprice";
