//! Signed, optionally encrypted message envelopes
//!
//! # Wire format
//!
//! ```json
//! {
//!   "contents": {
//!     "timestamp": "2009-02-13T23:31:30.005Z",
//!     "recipient": "b.example.com",
//!     "sender": "a.example.com",
//!     "payload": { ... }
//!   },
//!   "signature": "<unpadded base64 Ed25519 signature>"
//! }
//! ```
//!
//! The signature covers the canonical encoding of `contents` and nothing
//! else. An encrypted packet is the unpadded base64 of the canonical
//! encoding of the whole envelope, sealed to the recipient's encryption key.
//!
//! # Sending
//! ```ignore
//! let ciphertext = packet::pack(&payload, &keys, &registry, "b.example.com").await?;
//! ```
//!
//! # Receiving
//! ```ignore
//! let (packet, payload): (Packet, MyPayload) =
//!     packet::unpack_as(&ciphertext, &keys, &registry).await?;
//! ```

mod artifact;
mod codec;
mod registry;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::canonical::{self, CanonicalBytes, SerializationError, Value};
use crate::timestamp;

pub use artifact::{PublicArtifact, Published};
pub use codec::{
    pack, pack_unencrypted, unpack, unpack_as, unpack_unencrypted, unpack_unencrypted_as,
    unpack_without_verification, unpack_without_verification_as,
};
pub use registry::{InMemoryRegistry, PublicKeyRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("missing recipient")]
    MissingRecipient,
    #[error("public key lookup failed: {0}")]
    RegistryLookup(#[source] RegistryError),
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),
    #[error("unable to decrypt packet: {0}")]
    DecryptionFailure(String),
    #[error("unable to parse packet: {0}")]
    MalformedPacket(String),
    #[error("unknown packet sender {0:?}")]
    UnknownSender(String),
    #[error("invalid signature by {0:?}")]
    SignatureInvalid(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("unable to decode payload: {0}")]
    PayloadDecode(#[source] serde_json::Error),
}

/// The signed part of a packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contents {
    /// When the packet was wrapped
    pub timestamp: String,
    /// Canonical host the packet is encrypted to; absent for public packets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Canonical host of the signer
    pub sender: String,
    #[serde(default)]
    pub payload: Value,
}

impl Contents {
    pub(crate) fn new(sender: &str, recipient: Option<&str>, payload: Value) -> Self {
        Self {
            timestamp: timestamp::format(Utc::now()),
            recipient: recipient.map(str::to_string),
            sender: sender.to_string(),
            payload,
        }
    }

    /// The bytes the signature is computed over
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, SerializationError> {
        canonical::serialize_data(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub contents: Contents,
    pub signature: String,
}

impl Packet {
    pub fn sender(&self) -> &str {
        &self.contents.sender
    }

    pub fn recipient(&self) -> Option<&str> {
        self.contents.recipient.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.contents.payload
    }

    /// When the sender wrapped the packet
    pub fn sent_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        timestamp::parse(&self.contents.timestamp)
    }

    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, PacketError> {
        canonical::from_value(&self.contents.payload).map_err(PacketError::PayloadDecode)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_recipient_omitted_when_absent() {
        let contents = Contents::new("a", None, Value::from("hi"));
        let json = serde_json::to_value(&contents).unwrap();
        assert!(json.get("recipient").is_none());
        assert_eq!(json["sender"], "a");
        assert_eq!(json["payload"], "hi");

        let contents = Contents::new("a", Some("b"), Value::Null);
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(json["recipient"], "b");
        assert!(json["payload"].is_null());
    }

    #[test]
    fn test_canonical_bytes_sorted() {
        let contents = Contents {
            timestamp: "2009-02-13T23:31:30Z".to_string(),
            recipient: Some("b".to_string()),
            sender: "a".to_string(),
            payload: Value::from(1i64),
        };
        assert_eq!(
            contents.canonical_bytes().unwrap().to_string(),
            r#"{"payload":1,"recipient":"b","sender":"a","timestamp":"2009-02-13T23:31:30Z"}"#
        );
    }

    #[test]
    fn test_sent_at_and_payload_decode() {
        let packet = Packet {
            contents: Contents {
                timestamp: "2009-02-13T23:31:30.005Z".to_string(),
                recipient: None,
                sender: "a".to_string(),
                payload: canonical::to_value(&vec!["x", "y"]).unwrap(),
            },
            signature: String::new(),
        };
        assert_eq!(packet.sent_at().unwrap().timestamp(), 1234567890);
        assert_eq!(
            packet.decode_payload::<Vec<String>>().unwrap(),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(matches!(
            packet.decode_payload::<u64>(),
            Err(PacketError::PayloadDecode(_))
        ));
    }
}
