//! AES-256 key wrapping (RFC 3394) for private key material at rest

use std::fmt;

use aes_kw::KekAes256 as Kek;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of an AES-256 key-encryption key in bytes
pub const MASTER_KEY_SIZE: usize = 32;
/// PEM tag used for locally stored master keys
pub const MASTER_KEY_PEM_TAG: &str = "MASTER KEY";

#[derive(Debug, thiserror::Error)]
pub enum KeyWrapError {
    #[error("key wrap error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A 256-bit key-encryption key
///
/// Wrapped output is 8 bytes longer than its input, and the input must be
/// a multiple of 8 bytes (every key we wrap is 32).
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_SIZE]);

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl From<[u8; MASTER_KEY_SIZE]> for MasterKey {
    fn from(bytes: [u8; MASTER_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl MasterKey {
    pub fn generate() -> Result<Self, KeyWrapError> {
        let mut buff = [0u8; MASTER_KEY_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        Ok(Self(buff))
    }

    pub fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyWrapError> {
        let kek = Kek::from(self.0);
        let wrapped = kek
            .wrap_vec(plaintext)
            .map_err(|_| anyhow::anyhow!("AES-KW wrap error"))?;
        Ok(wrapped)
    }

    pub fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyWrapError> {
        let kek = Kek::from(self.0);
        let unwrapped = kek
            .unwrap_vec(wrapped)
            .map_err(|_| anyhow::anyhow!("AES-KW unwrap error"))?;
        Ok(Zeroizing::new(unwrapped))
    }

    /// Encode in PEM format with tag "MASTER KEY"
    pub fn to_pem(&self) -> Zeroizing<String> {
        let pem = pem::Pem::new(MASTER_KEY_PEM_TAG, self.0.to_vec());
        Zeroizing::new(pem::encode(&pem))
    }

    pub fn from_pem(pem_str: &str) -> Result<Self, KeyWrapError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        if pem.tag() != MASTER_KEY_PEM_TAG {
            return Err(anyhow::anyhow!(
                "invalid PEM tag, expected {}, got {}",
                MASTER_KEY_PEM_TAG,
                pem.tag()
            )
            .into());
        }

        let contents = pem.contents();
        if contents.len() != MASTER_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid master key size in PEM, expected {}, got {}",
                MASTER_KEY_SIZE,
                contents.len()
            )
            .into());
        }

        let mut bytes = [0u8; MASTER_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self(bytes))
    }
}
