//! Transaction signing credential.
//!
//! The signing key is an owned object handed to the publisher at
//! construction; nothing in the crate reads key material from globals.

use crate::error::{Error, Result};
use crate::ledger::transaction::{AttestationTx, SignedTransaction};
use crate::utils::crypto::{PrivateKey, PublicKey};

/// Environment variable holding the hex-encoded attestor key
pub const SIGNING_KEY_ENV: &str = "ZKPRICE_SIGNING_KEY";

/// Something that can sign attestation transactions
pub trait TransactionSigner: Send + Sync {
    /// Key the ledger will see as submitter
    fn public_key(&self) -> PublicKey;

    /// Sign a transaction
    fn sign(&self, tx: AttestationTx) -> Result<SignedTransaction>;
}

/// Signer backed by an in-process secp256k1 key
pub struct KeySigner {
    key: PrivateKey,
    public: PublicKey,
}

impl KeySigner {
    /// Wrap a private key
    pub fn new(key: PrivateKey) -> Self {
        let public = key.public_key();
        Self { key, public }
    }

    /// Fresh random key
    pub fn generate() -> Self {
        Self::new(PrivateKey::generate())
    }

    /// Parse a hex-encoded key
    pub fn from_hex(hex: &str) -> Result<Self> {
        Ok(Self::new(PrivateKey::from_hex(hex)?))
    }

    /// Read the key from [`SIGNING_KEY_ENV`]
    pub fn from_env() -> Result<Self> {
        let hex = std::env::var(SIGNING_KEY_ENV).map_err(|_| Error::InvalidParameter {
            name: SIGNING_KEY_ENV.into(),
            reason: "not set".into(),
        })?;
        Self::from_hex(&hex)
    }
}

impl TransactionSigner for KeySigner {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign(&self, tx: AttestationTx) -> Result<SignedTransaction> {
        let signature = self.key.sign(&tx.signing_digest()?);
        Ok(SignedTransaction {
            tx,
            signer: self.public,
            signature,
        })
    }
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner").field("public", &self.public).finish()
    }
}
