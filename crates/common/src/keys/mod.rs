//! Service key sets
//!
//! A [`KeyPair`] holds one Ed25519 signing key and one X25519 encryption
//! key for an owner. Its [`PublicKeyPacket`] is what other services see;
//! its [`PrivateKeyPacket`] is the only form in which the private keys
//! leave the process, wrapped under a master key resolved through a
//! [`MasterKeyResolver`].

mod keypair;
mod manager;
pub mod master;
mod metadata;
mod packets;

pub use keypair::{Encryptor, KeyPair, Verifier};
pub use manager::KeyManager;
pub use master::{
    InMemoryMasterKeys, LocalWrappingKey, MasterKeyError, MasterKeyResolver, PemFileMasterKeys,
    ResolverChain, WrappingKey,
};
pub use metadata::KeyMetadata;
pub use packets::{PrivateKeyPacket, PublicKeyPacket};

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("key self-check failed: {0}")]
    SelfCheckFailed(String),
    #[error("keys are not encrypted; refusing to load")]
    NotEncrypted,
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("bad signature: {0}")]
    BadSignature(String),
    #[error(transparent)]
    MasterKey(#[from] MasterKeyError),
    #[error("malformed key packet: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
