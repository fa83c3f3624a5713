use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::crypto::{EncryptionSecretKey, MasterKey, SigningSecretKey};

use super::keypair::{Encryptor, KeyPair, Verifier};
use super::master::MasterKeyResolver;
use super::packets::{PrivateKeyPacket, PublicKeyPacket};
use super::KeyError;

/// Generates key sets and moves their private halves in and out of
/// envelope-encrypted storage
#[derive(Debug, Clone)]
pub struct KeyManager {
    resolver: Arc<dyn MasterKeyResolver>,
}

impl KeyManager {
    pub fn new(resolver: Arc<dyn MasterKeyResolver>) -> Self {
        Self { resolver }
    }

    pub fn generate(&self, owner: impl Into<String>) -> Result<KeyPair, KeyError> {
        KeyPair::generate(owner)
    }

    pub fn public_packet(keys: &KeyPair) -> PublicKeyPacket {
        keys.public_packet().clone()
    }

    pub fn encryptor_for(packet: &PublicKeyPacket) -> Result<Encryptor, KeyError> {
        packet.encryptor()
    }

    pub fn verifier_for(packet: &PublicKeyPacket) -> Result<Verifier, KeyError> {
        packet.verifier()
    }

    /// Wrap both private keys under the master key at `master_key_uri`
    pub async fn encrypt_keys(
        &self,
        keys: &KeyPair,
        master_key_uri: &str,
    ) -> Result<PrivateKeyPacket, KeyError> {
        let master = self.resolver.resolve(master_key_uri).await?;

        let private_signing_key = master.wrap(&keys.signing_secret().to_bytes()[..]).await?;
        let private_encryption_key = master
            .wrap(&keys.encryption_secret().to_bytes()[..])
            .await?;

        Ok(PrivateKeyPacket {
            metadata: keys.metadata().clone(),
            encrypted: true,
            master_key_uri: master_key_uri.to_string(),
            private_signing_key,
            private_encryption_key,
        })
    }

    /// Write `keys` to `sink` as a single JSON line
    pub async fn write_encrypted<W>(
        &self,
        keys: &KeyPair,
        master_key_uri: &str,
        sink: &mut W,
    ) -> Result<(), KeyError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let packet = self.encrypt_keys(keys, master_key_uri).await?;
        let mut data = serde_json::to_vec(&packet)?;
        data.push(b'\n');
        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(())
    }

    pub async fn write_encrypted_file(
        &self,
        keys: &KeyPair,
        master_key_uri: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), KeyError> {
        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        self.write_encrypted(keys, master_key_uri, &mut file).await
    }

    /// Rebuild a key pair from a private key packet
    ///
    /// `override_master_key_uri` takes precedence over the URI recorded in
    /// the packet. The result is self-checked exactly as in
    /// [`KeyPair::generate`].
    pub async fn decrypt_keys(
        &self,
        packet: &PrivateKeyPacket,
        override_master_key_uri: Option<&str>,
    ) -> Result<KeyPair, KeyError> {
        if !packet.encrypted {
            return Err(KeyError::NotEncrypted);
        }

        let master_key_uri = match override_master_key_uri {
            Some(uri) if !uri.is_empty() => uri,
            _ => packet.master_key_uri.as_str(),
        };
        let master = self.resolver.resolve(master_key_uri).await?;

        let signing_bytes = master.unwrap(&packet.private_signing_key).await?;
        let encryption_bytes = master.unwrap(&packet.private_encryption_key).await?;

        let signing = SigningSecretKey::from_slice(&signing_bytes)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("signing key: {}", e)))?;
        let encryption = EncryptionSecretKey::from_slice(&encryption_bytes)
            .map_err(|e| KeyError::InvalidPrivateKey(format!("encryption key: {}", e)))?;

        let keys = KeyPair::from_parts(packet.metadata.clone(), signing, encryption)?;
        tracing::debug!(
            key_id = %keys.id(),
            owner = %keys.owner(),
            master_key_uri,
            "loaded key pair"
        );
        Ok(keys)
    }

    pub async fn load_encrypted<R>(
        &self,
        source: &mut R,
        override_master_key_uri: Option<&str>,
    ) -> Result<KeyPair, KeyError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut data = Vec::new();
        source.read_to_end(&mut data).await?;
        let packet: PrivateKeyPacket = serde_json::from_slice(&data)?;
        self.decrypt_keys(&packet, override_master_key_uri).await
    }

    pub async fn load_encrypted_file(
        &self,
        path: impl AsRef<Path>,
        override_master_key_uri: Option<&str>,
    ) -> Result<KeyPair, KeyError> {
        let mut file = tokio::fs::File::open(path.as_ref()).await?;
        self.load_encrypted(&mut file, override_master_key_uri)
            .await
    }

    /// A fresh master key, PEM encoded, for use with `pem-file://` URIs
    pub fn generate_master_key_pem() -> Result<Zeroizing<String>, KeyError> {
        let key = MasterKey::generate().map_err(|e| KeyError::KeyGeneration(e.to_string()))?;
        Ok(key.to_pem())
    }
}
