//! Proof and commitment layer.
//!
//! - [`consensus`]: builds locally verified consensus proofs from price observations
//! - [`commitment`]: binds an attested price to its proof with a Poseidon hash
//! - [`prover`]: the opaque proving capability and its native development backend
//! - [`circuits`]: the agreement-and-average relation executed by the native backend

pub mod circuits;
pub mod commitment;
pub mod consensus;
pub mod prover;

pub use circuits::{Circuit, ConsensusCircuit, ConsensusOutput, ConsensusWitness};
pub use commitment::{AssetCode, AssetRegistry, Commitment, CommitmentBinder, CommitmentFormat, FieldElement};
pub use consensus::{ConsensusProof, ConsensusProofBuilder, ProofDigest};
pub use prover::{NativeProofSystem, ProofOutput, ProofSystem, ProveRequest, ProverBackend};
