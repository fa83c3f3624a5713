use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::canonical;
use crate::keys::KeyPair;

use super::artifact::PublicArtifact;
use super::registry::{PublicKeyRegistry, RegistryError};
use super::{Contents, Packet, PacketError};

/// Sign `payload` and encrypt it to `recipient`
///
/// Returns unpadded base64 of the sealed canonical envelope.
pub async fn pack<T>(
    payload: &T,
    keys: &KeyPair,
    registry: &dyn PublicKeyRegistry,
    recipient: &str,
) -> Result<String, PacketError>
where
    T: Serialize + ?Sized,
{
    if recipient.is_empty() {
        return Err(PacketError::MissingRecipient);
    }
    let recipient_keys = registry
        .lookup_public_keys(recipient)
        .await
        .map_err(PacketError::RegistryLookup)?;
    let encryptor = recipient_keys
        .encryptor()
        .map_err(|e| PacketError::EncryptionFailure(e.to_string()))?;

    let packet = sign(payload, keys, Some(recipient))?;
    let plaintext = canonical::serialize_data(&packet)?;
    let ciphertext = encryptor
        .encrypt(plaintext.as_bytes())
        .map_err(|e| PacketError::EncryptionFailure(e.to_string()))?;

    Ok(STANDARD_NO_PAD.encode(ciphertext))
}

/// Sign a public artifact without encrypting it
///
/// Returns the envelope as indented JSON text.
pub fn pack_unencrypted<T>(payload: &T, keys: &KeyPair) -> Result<String, PacketError>
where
    T: PublicArtifact,
{
    let packet = sign(payload, keys, None)?;
    let mut text = serde_json::to_string_pretty(&packet)
        .map_err(|e| canonical::SerializationError::Unrepresentable(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

/// Decrypt a packet addressed to `keys` and verify its sender's signature
pub async fn unpack(
    ciphertext: &str,
    keys: &KeyPair,
    registry: &dyn PublicKeyRegistry,
) -> Result<Packet, PacketError> {
    let packet = decrypt(ciphertext, keys)?;
    verify(&packet, registry).await?;
    Ok(packet)
}

pub async fn unpack_as<T: DeserializeOwned>(
    ciphertext: &str,
    keys: &KeyPair,
    registry: &dyn PublicKeyRegistry,
) -> Result<(Packet, T), PacketError> {
    let packet = unpack(ciphertext, keys, registry).await?;
    let payload = packet.decode_payload()?;
    Ok((packet, payload))
}

/// Verify a plaintext packet, as produced by [`pack_unencrypted`]
pub async fn unpack_unencrypted(
    plaintext: &str,
    registry: &dyn PublicKeyRegistry,
) -> Result<Packet, PacketError> {
    let packet = parse(plaintext.as_bytes())?;
    verify(&packet, registry).await?;
    Ok(packet)
}

pub async fn unpack_unencrypted_as<T: DeserializeOwned>(
    plaintext: &str,
    registry: &dyn PublicKeyRegistry,
) -> Result<(Packet, T), PacketError> {
    let packet = unpack_unencrypted(plaintext, registry).await?;
    let payload = packet.decode_payload()?;
    Ok((packet, payload))
}

/// Decrypt and parse a packet WITHOUT checking who signed it
///
/// Nothing about the returned packet is authenticated: the sender field is
/// whatever the ciphertext claims. Use [`unpack`] unless the caller has
/// another way to establish authenticity.
pub fn unpack_without_verification(
    ciphertext: &str,
    keys: &KeyPair,
) -> Result<Packet, PacketError> {
    decrypt(ciphertext, keys)
}

pub fn unpack_without_verification_as<T: DeserializeOwned>(
    ciphertext: &str,
    keys: &KeyPair,
) -> Result<(Packet, T), PacketError> {
    let packet = decrypt(ciphertext, keys)?;
    let payload = packet.decode_payload()?;
    Ok((packet, payload))
}

fn sign<T>(payload: &T, keys: &KeyPair, recipient: Option<&str>) -> Result<Packet, PacketError>
where
    T: Serialize + ?Sized,
{
    let contents = Contents::new(keys.owner(), recipient, canonical::to_value(payload)?);
    let signature = keys.sign(contents.canonical_bytes()?.as_bytes());
    Ok(Packet {
        contents,
        signature: STANDARD_NO_PAD.encode(signature),
    })
}

fn decrypt(ciphertext: &str, keys: &KeyPair) -> Result<Packet, PacketError> {
    let sealed = STANDARD_NO_PAD
        .decode(ciphertext.trim())
        .map_err(|e| PacketError::DecryptionFailure(e.to_string()))?;
    let plaintext = keys
        .decrypt(&sealed)
        .map_err(|e| PacketError::DecryptionFailure(e.to_string()))?;
    parse(&plaintext)
}

fn parse(data: &[u8]) -> Result<Packet, PacketError> {
    serde_json::from_slice(data).map_err(|e| PacketError::MalformedPacket(e.to_string()))
}

async fn verify(packet: &Packet, registry: &dyn PublicKeyRegistry) -> Result<(), PacketError> {
    let sender = packet.sender();
    let sender_keys = match registry.lookup_public_keys(sender).await {
        Ok(keys) => keys,
        Err(RegistryError::NotFound(_)) => {
            return Err(PacketError::UnknownSender(sender.to_string()))
        }
        Err(e) => return Err(PacketError::RegistryLookup(e)),
    };

    let invalid = || PacketError::SignatureInvalid(sender.to_string());
    let verifier = sender_keys.verifier().map_err(|_| invalid())?;
    let signature = STANDARD_NO_PAD
        .decode(&packet.signature)
        .map_err(|_| invalid())?;
    let signed = packet.contents.canonical_bytes()?;
    verifier
        .verify(signed.as_bytes(), &signature)
        .map_err(|_| invalid())
}
