use crate::crypto::{
    EncryptionPublicKey, EncryptionSecretKey, SigningPublicKey, SigningSecretKey, SIGNATURE_SIZE,
};

use super::metadata::KeyMetadata;
use super::packets::PublicKeyPacket;
use super::KeyError;

/// A service's signing and encryption key pairs
///
/// The only constructors run [`KeyPair::self_check`], so a `KeyPair` value
/// has always signed-and-verified and sealed-and-opened an empty message
/// with its own keys. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct KeyPair {
    metadata: KeyMetadata,
    signing: SigningSecretKey,
    encryption: EncryptionSecretKey,
    public: PublicKeyPacket,
}

impl KeyPair {
    /// Generate fresh keys for `owner`
    pub fn generate(owner: impl Into<String>) -> Result<Self, KeyError> {
        let metadata = KeyMetadata::new(owner);
        let signing = SigningSecretKey::generate()
            .map_err(|e| KeyError::KeyGeneration(format!("signing key: {}", e)))?;
        let encryption = EncryptionSecretKey::generate()
            .map_err(|e| KeyError::KeyGeneration(format!("encryption key: {}", e)))?;

        let keys = Self::from_parts(metadata, signing, encryption)?;
        tracing::debug!(key_id = %keys.id(), owner = %keys.owner(), "generated key pair");
        Ok(keys)
    }

    pub(crate) fn from_parts(
        metadata: KeyMetadata,
        signing: SigningSecretKey,
        encryption: EncryptionSecretKey,
    ) -> Result<Self, KeyError> {
        let public = PublicKeyPacket {
            metadata: metadata.clone(),
            public_signing_key: signing.public().to_base64(),
            public_encryption_key: encryption.public().to_base64(),
        };
        let keys = Self {
            metadata,
            signing,
            encryption,
            public,
        };
        keys.self_check()?;
        Ok(keys)
    }

    fn self_check(&self) -> Result<(), KeyError> {
        let signature = self.sign(b"");
        self.public
            .verifier()
            .map_err(|e| KeyError::SelfCheckFailed(format!("verifier for own key: {}", e)))?
            .verify(b"", &signature)
            .map_err(|e| KeyError::SelfCheckFailed(format!("verify own signature: {}", e)))?;

        let ciphertext = self
            .public
            .encryptor()
            .map_err(|e| KeyError::SelfCheckFailed(format!("encryptor for own key: {}", e)))?
            .encrypt(b"")
            .map_err(|e| KeyError::SelfCheckFailed(format!("encrypt empty message: {}", e)))?;
        let plaintext = self
            .decrypt(&ciphertext)
            .map_err(|e| KeyError::SelfCheckFailed(format!("decrypt empty message: {}", e)))?;
        if !plaintext.is_empty() {
            return Err(KeyError::SelfCheckFailed(format!(
                "decrypting empty message produced {} bytes",
                plaintext.len()
            )));
        }
        Ok(())
    }

    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn owner(&self) -> &str {
        &self.metadata.owner
    }

    /// The shareable projection of these keys
    pub fn public_packet(&self) -> &PublicKeyPacket {
        &self.public
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing.sign(msg)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.encryption
            .open(ciphertext)
            .map_err(|e| KeyError::Decrypt(e.to_string()))
    }

    pub(crate) fn signing_secret(&self) -> &SigningSecretKey {
        &self.signing
    }

    pub(crate) fn encryption_secret(&self) -> &EncryptionSecretKey {
        &self.encryption
    }
}

/// Encrypts messages to one recipient's public encryption key
#[derive(Debug, Clone)]
pub struct Encryptor {
    owner: String,
    key: EncryptionPublicKey,
}

impl Encryptor {
    pub(crate) fn new(packet: &PublicKeyPacket) -> Result<Self, KeyError> {
        let key = EncryptionPublicKey::from_base64(&packet.public_encryption_key).map_err(|e| {
            KeyError::InvalidPublicKey(format!(
                "encryption key {:?}: {}",
                packet.public_encryption_key, e
            ))
        })?;
        let encryptor = Self {
            owner: packet.metadata.owner.clone(),
            key,
        };
        encryptor.encrypt(b"").map_err(|e| {
            KeyError::InvalidPublicKey(format!("smoke-test encryption failed: {}", e))
        })?;
        Ok(encryptor)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.key
            .seal(plaintext)
            .map_err(|e| KeyError::Encrypt(e.to_string()))
    }
}

/// Checks signatures made by one owner's signing key
#[derive(Debug, Clone)]
pub struct Verifier {
    owner: String,
    key: SigningPublicKey,
}

impl Verifier {
    pub(crate) fn new(packet: &PublicKeyPacket) -> Result<Self, KeyError> {
        let key = SigningPublicKey::from_base64(&packet.public_signing_key).map_err(|e| {
            KeyError::InvalidPublicKey(format!(
                "signing key {:?}: {}",
                packet.public_signing_key, e
            ))
        })?;
        Ok(Self {
            owner: packet.metadata.owner.clone(),
            key,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        self.key
            .verify(msg, signature)
            .map_err(|e| KeyError::BadSignature(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_passes_self_check() {
        let keys = KeyPair::generate("a.example.com").unwrap();
        assert_eq!(keys.owner(), "a.example.com");
        assert_eq!(keys.public_packet().owner(), "a.example.com");
        assert_eq!(keys.public_packet().metadata, *keys.metadata());
        keys.self_check().unwrap();
    }

    #[test]
    fn test_mismatched_halves_fail_self_check() {
        let good = KeyPair::generate("a").unwrap();
        let mut broken = good.clone();
        broken.public.public_signing_key = SigningSecretKey::generate()
            .unwrap()
            .public()
            .to_base64();
        assert!(matches!(
            broken.self_check(),
            Err(KeyError::SelfCheckFailed(_))
        ));

        let mut broken = good;
        broken.public.public_encryption_key = EncryptionSecretKey::generate()
            .unwrap()
            .public()
            .to_base64();
        assert!(matches!(
            broken.self_check(),
            Err(KeyError::SelfCheckFailed(_))
        ));
    }

    #[test]
    fn test_encryptor_and_verifier() {
        let keys = KeyPair::generate("b").unwrap();
        let public = keys.public_packet();

        let ciphertext = public.encryptor().unwrap().encrypt(b"hi").unwrap();
        assert_eq!(keys.decrypt(&ciphertext).unwrap(), b"hi");

        let signature = keys.sign(b"msg");
        let verifier = public.verifier().unwrap();
        assert_eq!(verifier.owner(), "b");
        verifier.verify(b"msg", &signature).unwrap();
        assert!(verifier.verify(b"msg2", &signature).is_err());
    }

    #[test]
    fn test_invalid_public_keys_rejected() {
        let keys = KeyPair::generate("c").unwrap();

        let mut packet = keys.public_packet().clone();
        packet.public_encryption_key = "not a key".to_string();
        assert!(matches!(
            packet.encryptor(),
            Err(KeyError::InvalidPublicKey(_))
        ));

        // a low-order point parses but fails the smoke test
        packet.public_encryption_key = EncryptionPublicKey::from([0u8; 32]).to_base64();
        assert!(matches!(
            packet.encryptor(),
            Err(KeyError::InvalidPublicKey(_))
        ));

        packet.public_signing_key = "AAAA".to_string();
        assert!(matches!(
            packet.verifier(),
            Err(KeyError::InvalidPublicKey(_))
        ));
    }
}
