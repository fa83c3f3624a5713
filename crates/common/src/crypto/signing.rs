//! Ed25519 signing keys
//!
//! Public keys travel as unpadded standard base64 of the 32 raw key bytes,
//! signatures as unpadded standard base64 of the 64 signature bytes.

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

/// Size of Ed25519 private key in bytes
pub const SIGNING_SECRET_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const SIGNING_PUBLIC_SIZE: usize = 32;
/// Size of Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Errors that can occur during signing key operations
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signing key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public half of a signing key pair
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SigningPublicKey(VerifyingKey);

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningPublicKey")
            .field(&self.to_base64())
            .finish()
    }
}

impl TryFrom<&[u8]> for SigningPublicKey {
    type Error = SigningError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buff: [u8; SIGNING_PUBLIC_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "invalid signing public key size, expected {}, got {}",
                SIGNING_PUBLIC_SIZE,
                bytes.len()
            )
        })?;
        let key = VerifyingKey::from_bytes(&buff)
            .map_err(|e| anyhow::anyhow!("invalid signing public key: {}", e))?;
        Ok(Self(key))
    }
}

impl SigningPublicKey {
    pub fn to_bytes(&self) -> [u8; SIGNING_PUBLIC_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        STANDARD_NO_PAD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let bytes = STANDARD_NO_PAD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("signing public key base64 decode error: {}", e))?;
        Self::try_from(bytes.as_slice())
    }

    /// Verify a detached signature over `msg`
    ///
    /// Uses strict verification, so malleable and small-order signatures
    /// are rejected.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), SigningError> {
        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|e| anyhow::anyhow!("malformed signature: {}", e))?;
        self.0
            .verify_strict(msg, &signature)
            .map_err(|e| anyhow::anyhow!("signature verification failed: {}", e))?;
        Ok(())
    }
}

/// Private half of a signing key pair
///
/// Zeroized on drop by `ed25519-dalek`.
#[derive(Clone)]
pub struct SigningSecretKey(SigningKey);

impl fmt::Debug for SigningSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecretKey")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}

impl SigningSecretKey {
    /// Generate a new random key from the OS RNG
    pub fn generate() -> Result<Self, SigningError> {
        let mut bytes = Zeroizing::new([0u8; SIGNING_SECRET_SIZE]);
        getrandom::getrandom(&mut *bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        Ok(Self(SigningKey::from_bytes(&bytes)))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SigningError> {
        let buff: &[u8; SIGNING_SECRET_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "invalid signing private key size, expected {}, got {}",
                SIGNING_SECRET_SIZE,
                bytes.len()
            )
        })?;
        Ok(Self(SigningKey::from_bytes(buff)))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; SIGNING_SECRET_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public(&self) -> SigningPublicKey {
        SigningPublicKey(self.0.verifying_key())
    }

    /// Produce a detached signature over `msg`
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.0.sign(msg).to_bytes()
    }
}
