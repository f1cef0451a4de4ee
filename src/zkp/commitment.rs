//! Deterministic commitments over attested prices.
//!
//! A commitment binds `(price, timestamp, asset, proof digest)` into one
//! BN254 field element with a circom-compatible Poseidon hash, so that it
//! can be re-derived cheaply inside constrained verifiers. The hash choice
//! is versioned by [`CommitmentFormat`]; a new format never reproduces
//! values of an old one.
//!
//! Asset identifiers are mapped to field integers through an
//! [`AssetRegistry`] built once at startup. Registry construction is where
//! encoding collisions surface.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::AttestorConfig;
use crate::error::{Error, Result};
use crate::utils::constants::{FIELD_ELEMENT_LENGTH, MAX_ASSET_ID_LEN, MAX_DIRECT_ASSET_LEN};
use crate::utils::crypto::Hash;
use crate::zkp::consensus::ProofDigest;

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD ELEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical big-endian encoding of a BN254 scalar
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldElement([u8; FIELD_ELEMENT_LENGTH]);

impl FieldElement {
    fn from_fr(value: &Fr) -> Self {
        let bytes = value.into_bigint().to_bytes_be();
        let mut out = [0u8; FIELD_ELEMENT_LENGTH];
        out[FIELD_ELEMENT_LENGTH - bytes.len()..].copy_from_slice(&bytes);
        Self(out)
    }

    fn to_fr(self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.0)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; FIELD_ELEMENT_LENGTH] {
        &self.0
    }

    /// Hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET ENCODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Field integer standing in for an asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetCode(FieldElement);

impl AssetCode {
    /// Encode an asset identifier
    ///
    /// Identifiers up to 31 bytes are their big-endian byte value, which is
    /// injective and below the field modulus. Longer identifiers (up to 64
    /// bytes) are Keccak256-reduced into the field.
    pub fn encode(asset_id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidAsset {
            asset: asset_id.to_string(),
            reason: reason.to_string(),
        };

        if asset_id.is_empty() {
            return Err(invalid("empty identifier"));
        }
        if asset_id.len() > MAX_ASSET_ID_LEN {
            return Err(invalid("identifier too long"));
        }
        if !asset_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':' | b'/'))
        {
            return Err(invalid("identifier must be ASCII alphanumeric or _-.:/"));
        }

        let element = if asset_id.len() <= MAX_DIRECT_ASSET_LEN {
            let mut bytes = [0u8; FIELD_ELEMENT_LENGTH];
            bytes[FIELD_ELEMENT_LENGTH - asset_id.len()..].copy_from_slice(asset_id.as_bytes());
            FieldElement(bytes)
        } else {
            let digest = Hash::keccak256(asset_id.as_bytes());
            FieldElement::from_fr(&Fr::from_be_bytes_mod_order(digest.as_bytes()))
        };
        Ok(Self(element))
    }

    /// Field element value
    pub fn element(&self) -> &FieldElement {
        &self.0
    }
}

/// The asset universe in use, validated once at startup
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    codes: BTreeMap<String, AssetCode>,
}

impl AssetRegistry {
    /// Build a registry, failing on invalid identifiers or encoding collisions
    pub fn new<I, S>(assets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_encoder(assets, AssetCode::encode)
    }

    fn with_encoder<I, S, F>(assets: I, encode: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Result<AssetCode>,
    {
        let mut codes = BTreeMap::new();
        let mut owners: BTreeMap<AssetCode, String> = BTreeMap::new();

        for asset in assets {
            let asset = asset.as_ref();
            if codes.contains_key(asset) {
                continue;
            }
            let code = encode(asset)?;
            if let Some(first) = owners.get(&code) {
                return Err(Error::AssetCollision {
                    first: first.clone(),
                    second: asset.to_string(),
                });
            }
            owners.insert(code, asset.to_string());
            codes.insert(asset.to_string(), code);
        }

        Ok(Self { codes })
    }

    /// Registry over the configured asset universe
    pub fn from_config(config: &AttestorConfig) -> Result<Self> {
        Self::new(&config.assets)
    }

    /// Encoding of a registered asset
    pub fn code(&self, asset_id: &str) -> Result<AssetCode> {
        self.codes.get(asset_id).copied().ok_or_else(|| Error::InvalidAsset {
            asset: asset_id.to_string(),
            reason: "asset not registered".into(),
        })
    }

    /// Whether `asset_id` is registered
    pub fn contains(&self, asset_id: &str) -> bool {
        self.codes.contains_key(asset_id)
    }

    /// Registered identifiers
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }

    /// Number of registered assets
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMITMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Commitment hash function and input layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CommitmentFormat {
    /// Poseidon (circom parameters, BN254) over `[price, timestamp, asset, digest mod r]`
    #[default]
    PoseidonBn254V1,
}

impl CommitmentFormat {
    /// Tag byte prefixed to the serialized commitment
    pub fn tag(&self) -> u8 {
        match self {
            CommitmentFormat::PoseidonBn254V1 => 0x01,
        }
    }

    /// Parse a tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(CommitmentFormat::PoseidonBn254V1),
            _ => None,
        }
    }
}

/// Deterministic binding of price, timestamp, asset and proof identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    format: CommitmentFormat,
    value: FieldElement,
    asset_id: String,
    timestamp: u64,
    price: u64,
    proof_digest: ProofDigest,
}

impl Commitment {
    /// Hash format the value was produced with
    pub fn format(&self) -> CommitmentFormat {
        self.format
    }

    /// Commitment value
    pub fn value(&self) -> &FieldElement {
        &self.value
    }

    /// Committed asset
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Committed timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Committed price
    pub fn price(&self) -> u64 {
        self.price
    }

    /// Committed proof digest
    pub fn proof_digest(&self) -> &ProofDigest {
        &self.proof_digest
    }

    /// Wire form: format tag followed by the 32-byte value
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + FIELD_ELEMENT_LENGTH);
        bytes.push(self.format.tag());
        bytes.extend_from_slice(self.value.as_bytes());
        bytes
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Pure commitment derivation; safe to share across concurrent rounds
#[derive(Debug, Clone)]
pub struct CommitmentBinder {
    registry: Arc<AssetRegistry>,
    format: CommitmentFormat,
}

impl CommitmentBinder {
    /// Create a binder over a validated asset registry
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        Self {
            registry,
            format: CommitmentFormat::default(),
        }
    }

    /// Format this binder produces
    pub fn format(&self) -> CommitmentFormat {
        self.format
    }

    /// Derive the commitment for one attestation
    pub fn bind(
        &self,
        price: u64,
        timestamp: u64,
        asset_id: &str,
        proof_digest: &ProofDigest,
    ) -> Result<Commitment> {
        let asset = self.registry.code(asset_id)?;

        let value = match self.format {
            CommitmentFormat::PoseidonBn254V1 => {
                let inputs = [
                    Fr::from(price),
                    Fr::from(timestamp),
                    asset.element().to_fr(),
                    Fr::from_be_bytes_mod_order(proof_digest.as_bytes()),
                ];
                let mut poseidon = Poseidon::<Fr>::new_circom(inputs.len())
                    .map_err(|e| Error::CommitmentHash(e.to_string()))?;
                let out = poseidon
                    .hash(&inputs)
                    .map_err(|e| Error::CommitmentHash(e.to_string()))?;
                FieldElement::from_fr(&out)
            }
        };

        Ok(Commitment {
            format: self.format,
            value,
            asset_id: asset_id.to_string(),
            timestamp,
            price,
            proof_digest: *proof_digest,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn binder() -> CommitmentBinder {
        CommitmentBinder::new(Arc::new(AssetRegistry::new(["NVDA", "TSLA"]).unwrap()))
    }

    #[test]
    fn test_bind_deterministic() {
        let digest = ProofDigest::of(b"proof");
        let a = binder().bind(3_005_000_000, 1_700_000_000, "NVDA", &digest).unwrap();
        let b = binder().bind(3_005_000_000, 1_700_000_000, "NVDA", &digest).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_bytes().len(), 33);
        assert_eq!(a.to_bytes()[0], CommitmentFormat::PoseidonBn254V1.tag());
    }

    #[test]
    fn test_bind_sensitive_to_every_input() {
        let digest = ProofDigest::of(b"proof");
        let base = binder().bind(100, 200, "NVDA", &digest).unwrap();

        assert_ne!(base.value(), binder().bind(101, 200, "NVDA", &digest).unwrap().value());
        assert_ne!(base.value(), binder().bind(100, 201, "NVDA", &digest).unwrap().value());
        assert_ne!(base.value(), binder().bind(100, 200, "TSLA", &digest).unwrap().value());
        assert_ne!(
            base.value(),
            binder().bind(100, 200, "NVDA", &ProofDigest::of(b"other")).unwrap().value()
        );
    }

    #[test]
    fn test_unregistered_asset() {
        let err = binder().bind(1, 1, "AAPL", &ProofDigest::of(b"p")).unwrap_err();
        assert!(matches!(err, Error::InvalidAsset { .. }));
    }

    #[test]
    fn test_asset_encoding() {
        let code = AssetCode::encode("NVDA").unwrap();
        assert_eq!(&code.element().as_bytes()[28..], b"NVDA");
        assert!(code.element().as_bytes()[..28].iter().all(|&b| b == 0));

        assert!(AssetCode::encode("").is_err());
        assert!(AssetCode::encode("bad asset").is_err());
        assert!(AssetCode::encode(&"X".repeat(65)).is_err());

        let long = "L".repeat(40);
        assert_ne!(AssetCode::encode(&long).unwrap(), AssetCode::encode(&"L".repeat(41)).unwrap());
    }

    #[test]
    fn test_registry_deduplicates_and_lists() {
        let registry = AssetRegistry::new(["NVDA", "TSLA", "NVDA"]).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("TSLA"));
        assert_eq!(registry.assets().collect::<Vec<_>>(), vec!["NVDA", "TSLA"]);
    }

    #[test]
    fn test_registry_rejects_encoding_collision() {
        // Case-folding encoder maps "nvda" and "NVDA" to the same integer
        let folded = |asset: &str| AssetCode::encode(&asset.to_ascii_uppercase());

        let result = AssetRegistry::with_encoder(["NVDA", "TSLA", "nvda"], folded);
        assert_eq!(
            result.unwrap_err(),
            Error::AssetCollision { first: "NVDA".into(), second: "nvda".into() }
        );

        // Repeating an identifier is not a collision
        let registry = AssetRegistry::with_encoder(["NVDA", "NVDA"], folded).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_format_tag_roundtrip() {
        let format = CommitmentFormat::PoseidonBn254V1;
        assert_eq!(CommitmentFormat::from_tag(format.tag()), Some(format));
        assert_eq!(CommitmentFormat::from_tag(0xff), None);
    }

    proptest! {
        #[test]
        fn prop_bind_deterministic(price in any::<u64>(), ts in any::<u64>(), seed in any::<[u8; 8]>()) {
            let digest = ProofDigest::of(&seed);
            let b = binder();
            let first = b.bind(price, ts, "TSLA", &digest).unwrap();
            let second = b.bind(price, ts, "TSLA", &digest).unwrap();
            prop_assert_eq!(first.value(), second.value());
        }
    }
}
