//! Per-message symmetric layer of a sealed packet
//!
//! Sealing derives one `ContentKey` per message from an X25519 exchange
//! and hands it the plaintext. The body it produces is
//!
//! ```text
//! nonce[12] | chacha20poly1305(checksum[32] | plaintext) | tag[16]
//! ```
//!
//! where `checksum` is the BLAKE3 digest of the plaintext.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const NONCE_SIZE: usize = 12;
pub const CONTENT_KEY_SIZE: usize = 32;
/// BLAKE3 digest of the plaintext, carried inside the ciphertext
pub const CHECKSUM_SIZE: usize = 32;
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ContentKeyError {
    #[error("content key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Symmetric key for a single sealed body
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; CONTENT_KEY_SIZE]);

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

impl From<[u8; CONTENT_KEY_SIZE]> for ContentKey {
    fn from(bytes: [u8; CONTENT_KEY_SIZE]) -> Self {
        ContentKey(bytes)
    }
}

impl ContentKey {
    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Seal `plaintext` into a body under a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ContentKeyError> {
        let mut inner = Zeroizing::new(Vec::with_capacity(CHECKSUM_SIZE + plaintext.len()));
        inner.extend_from_slice(blake3::hash(plaintext).as_bytes());
        inner.extend_from_slice(plaintext);

        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| anyhow::anyhow!("nonce unavailable: {}", e))?;
        let sealed = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), inner.as_slice())
            .map_err(|_| anyhow::anyhow!("body encryption failed"))?;

        let mut body = nonce.to_vec();
        body.extend(sealed);
        Ok(body)
    }

    /// Open a body produced by [`ContentKey::encrypt`]
    ///
    /// Fails on short input, on a tag mismatch and when the checksum does
    /// not match the recovered plaintext.
    pub fn decrypt(&self, body: &[u8]) -> Result<Vec<u8>, ContentKeyError> {
        if body.len() < NONCE_SIZE + CHECKSUM_SIZE + TAG_SIZE {
            return Err(anyhow::anyhow!("sealed body is only {} bytes", body.len()).into());
        }
        let (nonce, sealed) = body.split_at(NONCE_SIZE);
        let inner = Zeroizing::new(
            self.cipher()
                .decrypt(Nonce::from_slice(nonce), sealed)
                .map_err(|_| anyhow::anyhow!("body failed authentication"))?,
        );

        let (checksum, plaintext) = inner.split_at(CHECKSUM_SIZE);
        if checksum != blake3::hash(plaintext).as_bytes() {
            return Err(anyhow::anyhow!("body checksum mismatch").into());
        }
        Ok(plaintext.to_vec())
    }
}
