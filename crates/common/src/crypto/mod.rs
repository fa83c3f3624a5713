//! Cryptographic primitives for the trust core
//!
//! - **Signing**: Ed25519 key pairs; every packet and every published key
//!   set is attributed to an owner through one of these
//! - **Sealing**: hybrid encryption to a recipient's X25519 public key,
//!   ChaCha20-Poly1305 for the bulk payload
//! - **Key wrapping**: AES-256-KW under a master key, used to keep private
//!   key material encrypted at rest
//!
//! # Sealed message layout
//!
//! ```text
//! [ ephemeral_pub: 32 ][ nonce: 12 ][ chacha20poly1305( blake3(pt): 32 || pt ) ][ tag: 16 ]
//! ```
//!
//! The content key is derived with BLAKE3 in key-derivation mode from the
//! X25519 shared secret and both public keys, so it is unique per message.

mod content_key;
mod key_wrap;
mod sealing;
mod signing;

pub use content_key::{ContentKey, ContentKeyError, CHECKSUM_SIZE, NONCE_SIZE, TAG_SIZE};
pub use key_wrap::{KeyWrapError, MasterKey, MASTER_KEY_PEM_TAG, MASTER_KEY_SIZE};
pub use sealing::{
    EncryptionPublicKey, EncryptionSecretKey, SealError, ENCRYPTION_KEY_SIZE, SEAL_OVERHEAD,
};
pub use signing::{
    SigningError, SigningPublicKey, SigningSecretKey, SIGNATURE_SIZE, SIGNING_PUBLIC_SIZE,
    SIGNING_SECRET_SIZE,
};
