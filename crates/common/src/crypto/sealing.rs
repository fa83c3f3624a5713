//! Hybrid public-key encryption using X25519 + BLAKE3 + ChaCha20-Poly1305
//!
//! # Protocol Overview
//!
//! To seal a plaintext for a recipient:
//! 1. **Generate ephemeral keypair**: Create a one-time X25519 keypair
//! 2. **Perform ECDH**: Combine the ephemeral secret with the recipient's public key
//! 3. **Derive key**: BLAKE3 in key-derivation mode over `shared || ephemeral_pub || recipient_pub`
//! 4. **Encrypt**: Use the derived [`ContentKey`] on the plaintext
//! 5. **Package**: `ephemeral_pub (32) || content ciphertext`
//!
//! The recipient recomputes the same shared secret from the ephemeral public
//! key and their own private key, then decrypts.
//!
//! Non-contributory exchanges (low-order recipient or ephemeral points) are
//! rejected in both directions.

use std::fmt;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::content_key::{ContentKey, ContentKeyError, CHECKSUM_SIZE, NONCE_SIZE, TAG_SIZE};

/// Size of an X25519 key in bytes
pub const ENCRYPTION_KEY_SIZE: usize = 32;
/// Overhead a sealed message adds to its plaintext
pub const SEAL_OVERHEAD: usize = ENCRYPTION_KEY_SIZE + NONCE_SIZE + CHECKSUM_SIZE + TAG_SIZE;

const SEAL_KDF_CONTEXT: &str = "trustgate 2025 sealed packet x25519-chacha20poly1305 v1";

/// Errors that can occur while sealing or opening
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("seal error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("content key error: {0}")]
    ContentKey(#[from] ContentKeyError),
}

/// Public half of an encryption key pair
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncryptionPublicKey(X25519PublicKey);

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionPublicKey")
            .field(&self.to_base64())
            .finish()
    }
}

impl From<[u8; ENCRYPTION_KEY_SIZE]> for EncryptionPublicKey {
    fn from(bytes: [u8; ENCRYPTION_KEY_SIZE]) -> Self {
        Self(X25519PublicKey::from(bytes))
    }
}

impl TryFrom<&[u8]> for EncryptionPublicKey {
    type Error = SealError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buff: [u8; ENCRYPTION_KEY_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "invalid encryption public key size, expected {}, got {}",
                ENCRYPTION_KEY_SIZE,
                bytes.len()
            )
        })?;
        Ok(buff.into())
    }
}

impl EncryptionPublicKey {
    pub fn to_bytes(&self) -> [u8; ENCRYPTION_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_base64(&self) -> String {
        STANDARD_NO_PAD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SealError> {
        let bytes = STANDARD_NO_PAD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("encryption public key base64 decode error: {}", e))?;
        Self::try_from(bytes.as_slice())
    }

    /// Seal a plaintext so only the holder of the matching secret can open it
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let ephemeral = EncryptionSecretKey::generate()?;
        let ephemeral_public = ephemeral.public();

        let content_key = derive_content_key(&ephemeral, self, &ephemeral_public, self)?;
        let ciphertext = content_key.encrypt(plaintext)?;

        let mut out = Vec::with_capacity(ENCRYPTION_KEY_SIZE + ciphertext.len());
        out.extend_from_slice(&ephemeral_public.to_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

/// Private half of an encryption key pair
///
/// Zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct EncryptionSecretKey(StaticSecret);

impl fmt::Debug for EncryptionSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSecretKey")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}

impl EncryptionSecretKey {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Result<Self, SealError> {
        let mut bytes = [0u8; ENCRYPTION_KEY_SIZE];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        // StaticSecret::from clamps and takes ownership; wipe our copy
        let secret = StaticSecret::from(bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        Ok(Self(secret))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SealError> {
        let buff: [u8; ENCRYPTION_KEY_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "invalid encryption private key size, expected {}, got {}",
                ENCRYPTION_KEY_SIZE,
                bytes.len()
            )
        })?;
        let buff = Zeroizing::new(buff);
        Ok(Self(StaticSecret::from(*buff)))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; ENCRYPTION_KEY_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public(&self) -> EncryptionPublicKey {
        EncryptionPublicKey(X25519PublicKey::from(&self.0))
    }

    /// Open a message produced by [`EncryptionPublicKey::seal`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The message is too short to hold the ephemeral key and ciphertext
    /// - The message was sealed for a different recipient
    /// - The ciphertext was tampered with
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(anyhow::anyhow!("sealed message too short").into());
        }
        let (ephemeral_bytes, ciphertext) = sealed.split_at(ENCRYPTION_KEY_SIZE);
        let ephemeral_public = EncryptionPublicKey::try_from(ephemeral_bytes)?;

        let content_key =
            derive_content_key(self, &ephemeral_public, &ephemeral_public, &self.public())?;
        Ok(content_key.decrypt(ciphertext)?)
    }
}

/// Both sides feed the same transcript into the KDF: the ECDH output, the
/// ephemeral public key, then the recipient public key.
fn derive_content_key(
    own_secret: &EncryptionSecretKey,
    peer_public: &EncryptionPublicKey,
    ephemeral_public: &EncryptionPublicKey,
    recipient_public: &EncryptionPublicKey,
) -> Result<ContentKey, SealError> {
    let shared = own_secret.0.diffie_hellman(&peer_public.0);
    if !shared.was_contributory() {
        return Err(anyhow::anyhow!("non-contributory key exchange").into());
    }

    let mut transcript = Zeroizing::new(Vec::with_capacity(3 * ENCRYPTION_KEY_SIZE));
    transcript.extend_from_slice(shared.as_bytes());
    transcript.extend_from_slice(&ephemeral_public.to_bytes());
    transcript.extend_from_slice(&recipient_public.to_bytes());

    Ok(ContentKey::from(blake3::derive_key(
        SEAL_KDF_CONTEXT,
        &transcript,
    )))
}
