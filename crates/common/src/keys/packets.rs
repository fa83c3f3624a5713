use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use super::keypair::{Encryptor, Verifier};
use super::metadata::KeyMetadata;
use super::KeyError;

/// The shareable half of a key set
///
/// Both keys are unpadded standard base64 of the raw public key bytes.
/// Contains no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyPacket {
    pub metadata: KeyMetadata,
    pub public_signing_key: String,
    pub public_encryption_key: String,
}

impl PublicKeyPacket {
    pub fn owner(&self) -> &str {
        &self.metadata.owner
    }

    /// An encryptor addressed to this packet's owner
    ///
    /// Runs a smoke-test encryption of an empty plaintext before returning.
    pub fn encryptor(&self) -> Result<Encryptor, KeyError> {
        Encryptor::new(self)
    }

    /// A verifier for signatures made by this packet's owner
    pub fn verifier(&self) -> Result<Verifier, KeyError> {
        Verifier::new(self)
    }
}

/// The persisted form of a key set's private material
///
/// Private keys are wrapped under the master key named by
/// `master_key_uri`; the loader refuses packets with `encrypted: false`.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyPacket {
    pub metadata: KeyMetadata,
    pub encrypted: bool,
    pub master_key_uri: String,
    #[serde_as(as = "Base64")]
    pub private_signing_key: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub private_encryption_key: Vec<u8>,
}

impl std::fmt::Debug for PrivateKeyPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyPacket")
            .field("metadata", &self.metadata)
            .field("encrypted", &self.encrypted)
            .field("master_key_uri", &self.master_key_uri)
            .finish_non_exhaustive()
    }
}
