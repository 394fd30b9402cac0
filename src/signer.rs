//! Signing capability consumed by the payload builder.
//!
//! The builder only knows the [`Signer`] trait. [`Ed25519Signer`] is a local
//! key implementation for demos, tests and simple wallets.

use crate::address::Address;
use crate::errors::{BoxError, Result, X402Error};
use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use std::fmt;

/// Something that can sign transaction bytes on behalf of an account.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Bech32 address of the signing account.
    fn address(&self) -> &str;

    /// Signs `message` and returns the raw signature bytes.
    ///
    /// Errors are passed back to the caller as they are reported.
    async fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, BoxError>;
}

/// Signs with an ed25519 key held in memory.
pub struct Ed25519Signer {
    key: SigningKey,
    address: String,
}

impl Ed25519Signer {
    /// Creates a signer from a 32-byte secret key.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        let key = SigningKey::from_bytes(secret);
        let address = Address::from_bytes(key.verifying_key().to_bytes()).to_bech32();
        Self { key, address }
    }

    /// Creates a signer from a hex-encoded secret key (optionally `0x` prefixed).
    pub fn from_secret_key_hex(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        let bytes = hex::decode(secret.strip_prefix("0x").unwrap_or(secret))
            .map_err(|e| X402Error::ConfigError(format!("Invalid secret key hex: {}", e)))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            X402Error::ConfigError(format!(
                "Secret key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(&secret))
    }

    /// Creates a signer with a fresh random key.
    pub fn generate() -> Self {
        let key = SigningKey::generate(&mut OsRng);
        Self::from_bytes(&key.to_bytes())
    }

    /// The account's raw public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}
