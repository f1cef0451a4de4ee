//! Protocol constants.
//!
//! All pipeline-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// CRYPTO LENGTHS
// ═══════════════════════════════════════════════════════════════════════════════

/// Hash length in bytes (SHA256 / Keccak256 / Blake3)
pub const HASH_LENGTH: usize = 32;

/// Compressed secp256k1 public key length
pub const PUBKEY_LENGTH: usize = 33;

/// Compact ECDSA signature length
pub const SIGNATURE_LENGTH: usize = 64;

/// BN254 scalar field element length in bytes
pub const FIELD_ELEMENT_LENGTH: usize = 32;

/// Longest asset identifier encoded directly (fits below the BN254 modulus)
pub const MAX_DIRECT_ASSET_LEN: usize = 31;

/// Longest asset identifier accepted at all
pub const MAX_ASSET_ID_LEN: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE CONVENTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of source and claimed ledger prices (3000000000 = $300.00)
pub const PRICE_DECIMALS: u32 = 7;

/// Decimals of the circuit's declared average (30050 = $300.50)
pub const OUTPUT_DECIMALS: u32 = 2;

/// Basis point divisor (10000 bps = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSENSUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum independent observations per round
pub const MIN_PRICE_SOURCES: usize = 2;

/// Default agreement band between sources - 7% (700 bps)
pub const DEFAULT_TOLERANCE_BPS: u64 = 700;

/// Largest tolerance a configuration may request - 50%
pub const MAX_TOLERANCE_BPS: u64 = 5_000;

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER VERIFIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum accepted proof payload length in bytes
pub const MIN_PROOF_LEN: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLISHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Confirmation poll interval
pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Maximum time to wait for a terminal ledger status
pub const MAX_CONFIRMATION_WAIT_SECS: u64 = 30;

/// Transient failure retry budget
pub const MAX_SUBMIT_RETRIES: u32 = 3;

/// Fixed delay between transient retries
pub const RETRY_BACKOFF_MS: u64 = 2_000;

/// Capacity of the outcome broadcast channel
pub const OUTCOME_CHANNEL_CAPACITY: usize = 256;
