//! Cryptographic primitives for zkprice.
//!
//! This module provides:
//! - Hashes (SHA256, Keccak256, Blake3)
//! - Private keys (secp256k1)
//! - Public keys (secp256k1 compressed)
//! - Compact ECDSA signatures
//!
//! Keccak256 is the ledger's native digest and is used for proof identity.
//! Transaction signing uses secp256k1 over SHA256 digests.

use secp256k1::{
    ecdsa::Signature as Secp256k1Signature, Message, PublicKey as Secp256k1PubKey, Secp256k1,
    SecretKey,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::{HASH_LENGTH, PUBKEY_LENGTH, SIGNATURE_LENGTH};

// ═══════════════════════════════════════════════════════════════════════════════
// SECP256K1 CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

thread_local! {
    static SECP: Secp256k1<secp256k1::All> = Secp256k1::new();
}

/// Execute a function with the secp256k1 context
fn with_secp<F, R>(f: F) -> R
where
    F: FnOnce(&Secp256k1<secp256k1::All>) -> R,
{
    SECP.with(|secp| f(secp))
}

/// Serde helper for fixed-size byte arrays as hex strings
fn deserialize_hex_array<'de, D, const N: usize>(deserializer: D) -> std::result::Result<[u8; N], D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
    if bytes.len() != N {
        return Err(serde::de::Error::custom(format!(
            "expected {} bytes, got {}",
            N,
            bytes.len()
        )));
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HASH
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte cryptographic hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LENGTH]);

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_hex_array::<D, HASH_LENGTH>(deserializer).map(Hash)
    }
}

impl Hash {
    /// Create a new hash from bytes
    pub fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create a hash from a slice (must be exactly 32 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != HASH_LENGTH {
            return Err(Error::InvalidParameter {
                name: "hash".into(),
                reason: format!("expected {} bytes, got {}", HASH_LENGTH, slice.len()),
            });
        }
        let mut bytes = [0u8; HASH_LENGTH];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Compute SHA256 hash of data
    pub fn sha256(data: &[u8]) -> Self {
        let result = Sha256::digest(data);
        let mut bytes = [0u8; HASH_LENGTH];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Compute Keccak256 hash of data (the ledger's native digest)
    pub fn keccak256(data: &[u8]) -> Self {
        let result = Keccak256::digest(data);
        let mut bytes = [0u8; HASH_LENGTH];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Compute Blake3 hash of data
    pub fn blake3(data: &[u8]) -> Self {
        let result = blake3::hash(data);
        Self(*result.as_bytes())
    }

    /// Get the hash as bytes
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidParameter {
            name: "hash".into(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Short hex prefix for logs
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }

    /// Convert to secp256k1 Message for signing
    fn to_message(&self) -> Message {
        Message::from_digest(*self.as_bytes())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Create a message hash for signing with domain separation
pub fn create_message_hash(operation: &str, data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(b"zkprice:");
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; HASH_LENGTH];
    bytes.copy_from_slice(&result);
    Hash::new(bytes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRIVATE KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Private key length in bytes
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// A secp256k1 private key for signing operations
#[derive(Clone)]
pub struct PrivateKey {
    inner: SecretKey,
}

impl PrivateKey {
    /// Create a new private key from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != PRIVATE_KEY_LENGTH {
            return Err(Error::InvalidParameter {
                name: "private_key".into(),
                reason: format!(
                    "expected {} bytes, got {}",
                    PRIVATE_KEY_LENGTH,
                    slice.len()
                ),
            });
        }
        let inner = SecretKey::from_slice(slice).map_err(|e| Error::CryptoError {
            operation: "private_key_from_slice".into(),
            details: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Generate a new random private key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let inner = SecretKey::new(&mut rng);
        Self { inner }
    }

    /// Create from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidParameter {
            name: "private_key".into(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Convert to hex string (SECURITY: be careful with this)
    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.secret_bytes())
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> PublicKey {
        with_secp(|secp| {
            let pk = Secp256k1PubKey::from_secret_key(secp, &self.inner);
            PublicKey::new(pk.serialize())
        })
    }

    /// Sign a message hash (RFC 6979 deterministic nonce)
    pub fn sign(&self, message: &Hash) -> Signature {
        with_secp(|secp| {
            let msg = message.to_message();
            let sig = secp.sign_ecdsa(&msg, &self.inner);
            Signature::new(sig.serialize_compact())
        })
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// A compressed secp256k1 public key (33 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBKEY_LENGTH]);

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_hex_array::<D, PUBKEY_LENGTH>(deserializer).map(PublicKey)
    }
}

impl PublicKey {
    /// Create a new public key from bytes (must be valid compressed format)
    pub fn new(bytes: [u8; PUBKEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse and validate from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidParameter {
            name: "public_key".into(),
            reason: e.to_string(),
        })?;
        let pk = Secp256k1PubKey::from_slice(&bytes).map_err(|e| Error::CryptoError {
            operation: "public_key_parse".into(),
            details: e.to_string(),
        })?;
        Ok(Self(pk.serialize()))
    }

    /// Get the public key as bytes
    pub fn as_bytes(&self) -> &[u8; PUBKEY_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature against this public key
    pub fn verify(&self, message: &Hash, signature: &Signature) -> bool {
        verify_signature(self, message, signature)
    }

    fn to_secp256k1(&self) -> Option<Secp256k1PubKey> {
        Secp256k1PubKey::from_slice(&self.0).ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURE
// ═══════════════════════════════════════════════════════════════════════════════

/// A compact ECDSA signature (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_hex_array::<D, SIGNATURE_LENGTH>(deserializer).map(Signature)
    }
}

impl Signature {
    /// Create a new signature from bytes
    pub fn new(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the signature as bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn to_secp256k1(&self) -> Option<Secp256k1Signature> {
        Secp256k1Signature::from_compact(&self.0).ok()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// Verify a signature against a message and public key
pub fn verify_signature(pubkey: &PublicKey, message: &Hash, signature: &Signature) -> bool {
    let pk = match pubkey.to_secp256k1() {
        Some(pk) => pk,
        None => return false,
    };

    let sig = match signature.to_secp256k1() {
        Some(sig) => sig,
        None => return false,
    };

    let msg = message.to_message();
    with_secp(|secp| secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// A key pair containing both private and public keys
#[derive(Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_private(PrivateKey::generate())
    }

    /// Create from a private key
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Create from private key hex
    pub fn from_hex(hex: &str) -> Result<Self> {
        Ok(Self::from_private(PrivateKey::from_hex(hex)?))
    }

    /// Get the private key
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign a message hash
    pub fn sign(&self, message: &Hash) -> Signature {
        self.private.sign(message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair {{ public: {:?} }}", self.public)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
