//! Proof system interface.
//!
//! The pipeline treats the proving stack as an opaque capability with two
//! operations: `prove` a consensus round and `verify_full` a proof against
//! its declared public inputs. Alternate proof systems plug in behind
//! [`ProofSystem`] without touching the pipeline.

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::utils::constants::HASH_LENGTH;
use crate::utils::crypto::{create_message_hash, Hash};
use crate::utils::math::PriceScale;
use crate::zkp::circuits::{Circuit, ConsensusCircuit, ConsensusWitness, PUBLIC_OUTPUT_COUNT};

// ═══════════════════════════════════════════════════════════════════════════════
// PROOF TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Inputs of one proving call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProveRequest {
    /// Asset the prices are for
    pub asset_id: String,
    /// Observed prices in source decimals
    pub prices: Vec<u64>,
    /// Agreement band in basis points
    pub tolerance_bps: u64,
}

/// What a prover returns: opaque proof bytes plus declared public inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    /// Serialized proof (format depends on backend)
    pub proof_bytes: Vec<u8>,
    /// Declared public inputs, in circuit order
    pub public_inputs: Vec<u64>,
}

/// Supported proof backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProverBackend {
    /// Native execution (no ZK, for development and testing)
    Native,
    /// External proving service (Noir/UltraHonk or similar)
    External,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROOF SYSTEM TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Proving and full verification capability
///
/// `prove` is not assumed idempotent: two calls on identical inputs may
/// return different proof bytes. `verify_full` is deterministic.
#[async_trait]
pub trait ProofSystem: Send + Sync {
    /// Backend identifier
    fn backend(&self) -> ProverBackend;

    /// Prove one consensus round
    async fn prove(&self, request: &ProveRequest) -> Result<ProofOutput>;

    /// Full cryptographic verification of a proof against its public inputs
    async fn verify_full(&self, proof_bytes: &[u8], public_inputs: &[u64]) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NATIVE PROOF SYSTEM (FOR DEVELOPMENT)
// ═══════════════════════════════════════════════════════════════════════════════

const NATIVE_MAGIC: &[u8; 4] = b"ZKPC";
const NATIVE_VERSION: u8 = 1;
const BLINDING_LENGTH: usize = 16;

/// Native proof length: magic | version | blinding | witness commitment | binding
pub const NATIVE_PROOF_LENGTH: usize = 4 + 1 + BLINDING_LENGTH + HASH_LENGTH + HASH_LENGTH;

/// Native proof system that executes the circuit directly without ZK
///
/// The "proof" binds a random blinding, a commitment to the private
/// witness and the public inputs under a domain-separated hash. This is
/// NOT zero-knowledge and NOT sound against a malicious prover; it exists
/// so the pipeline can run end to end without a proving service.
#[derive(Debug, Clone, Default)]
pub struct NativeProofSystem {
    scale: PriceScale,
}

impl NativeProofSystem {
    /// Create a native proof system with the given decimal conventions
    pub fn new(scale: PriceScale) -> Self {
        Self { scale }
    }

    fn binding(blinding: &[u8], witness_commitment: &[u8], public_inputs: &[u64]) -> Hash {
        let mut data = Vec::with_capacity(blinding.len() + witness_commitment.len() + 8 * public_inputs.len());
        data.extend_from_slice(ConsensusCircuit::circuit_id().as_bytes());
        data.extend_from_slice(blinding);
        data.extend_from_slice(witness_commitment);
        for input in public_inputs {
            data.extend_from_slice(&input.to_be_bytes());
        }
        create_message_hash("native-proof", &data)
    }

    fn encode(blinding: [u8; BLINDING_LENGTH], witness_commitment: Hash, public_inputs: &[u64]) -> Vec<u8> {
        let binding = Self::binding(&blinding, witness_commitment.as_bytes(), public_inputs);
        let mut proof = Vec::with_capacity(NATIVE_PROOF_LENGTH);
        proof.extend_from_slice(NATIVE_MAGIC);
        proof.push(NATIVE_VERSION);
        proof.extend_from_slice(&blinding);
        proof.extend_from_slice(witness_commitment.as_bytes());
        proof.extend_from_slice(binding.as_bytes());
        proof
    }
}

#[async_trait]
impl ProofSystem for NativeProofSystem {
    fn backend(&self) -> ProverBackend {
        ProverBackend::Native
    }

    async fn prove(&self, request: &ProveRequest) -> Result<ProofOutput> {
        let start = Instant::now();
        let witness = ConsensusWitness {
            asset_id: request.asset_id.clone(),
            prices: request.prices.clone(),
            tolerance_bps: request.tolerance_bps,
            scale: self.scale,
        };

        // Agreement is enforced again inside the circuit
        let output = ConsensusCircuit::execute(&witness)
            .map_err(|e| Error::ProofGenerationFailed(e.to_string()))?;
        let public_inputs = output.to_public_inputs();

        let mut blinding = [0u8; BLINDING_LENGTH];
        rand::thread_rng().fill_bytes(&mut blinding);

        let proof_bytes = Self::encode(blinding, witness.commitment(), &public_inputs);

        tracing::debug!(
            circuit = ConsensusCircuit::circuit_id(),
            asset = %request.asset_id,
            elapsed_us = start.elapsed().as_micros() as u64,
            "native proof generated"
        );

        Ok(ProofOutput {
            proof_bytes,
            public_inputs,
        })
    }

    async fn verify_full(&self, proof_bytes: &[u8], public_inputs: &[u64]) -> bool {
        if proof_bytes.len() != NATIVE_PROOF_LENGTH || public_inputs.len() != PUBLIC_OUTPUT_COUNT {
            return false;
        }
        if &proof_bytes[..4] != NATIVE_MAGIC || proof_bytes[4] != NATIVE_VERSION {
            return false;
        }

        let blinding = &proof_bytes[5..5 + BLINDING_LENGTH];
        let witness_commitment = &proof_bytes[5 + BLINDING_LENGTH..5 + BLINDING_LENGTH + HASH_LENGTH];
        let binding = &proof_bytes[5 + BLINDING_LENGTH + HASH_LENGTH..];

        Self::binding(blinding, witness_commitment, public_inputs).as_bytes()[..] == binding[..]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
