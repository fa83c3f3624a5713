//! Content hashes of raw bytes and of canonical values
//!
//! Textual form is `sha256:<lowercase hex>`. These tags are for integrity
//! checks and content-addressed deduplication. Comparison is ordinary
//! equality, so do not use them to compare secrets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::{self, SerializationError, Value};

/// Name of the only supported algorithm
pub const HASH_ALGORITHM: &str = "sha256";
/// Size of a SHA-256 digest in bytes
pub const DIGEST_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("expected \"sha256\" hash, got {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("malformed hash digest: {0}")]
    MalformedDigest(String),
    #[error("error serializing data: {0}")]
    Serialization(#[from] SerializationError),
}

/// An algorithm-tagged digest
///
/// Equality compares the algorithm and the digest together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    algorithm: String,
    digest: [u8; DIGEST_SIZE],
}

impl ContentHash {
    /// Hash raw bytes
    pub fn of_bytes(data: impl AsRef<[u8]>) -> Self {
        let digest: [u8; DIGEST_SIZE] = Sha256::digest(data.as_ref()).into();
        Self {
            algorithm: HASH_ALGORITHM.to_string(),
            digest,
        }
    }

    /// Hash the canonical encoding of a value
    pub fn of_value(value: &Value) -> Result<Self, HashError> {
        Ok(Self::of_bytes(canonical::serialize(value)?))
    }

    /// Hash the canonical encoding of any serializable type
    pub fn of_data<T: Serialize + ?Sized>(data: &T) -> Result<Self, HashError> {
        Ok(Self::of_bytes(canonical::serialize_data(data)?))
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, hex::encode(self.digest))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex_digest) = s.split_once(':').unwrap_or((s, ""));
        if algorithm != HASH_ALGORITHM {
            return Err(HashError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        let mut digest = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(hex_digest, &mut digest)
            .map_err(|e| HashError::MalformedDigest(e.to_string()))?;
        Ok(Self {
            algorithm: algorithm.to_string(),
            digest,
        })
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `sha256:<hex>` of raw bytes
pub fn hash(data: impl AsRef<[u8]>) -> String {
    ContentHash::of_bytes(data).to_string()
}

/// `sha256:<hex>` of a value's canonical encoding
pub fn hash_value(value: &Value) -> Result<String, HashError> {
    Ok(ContentHash::of_value(value)?.to_string())
}

/// Check a textual hash against raw bytes
///
/// Fails only when the algorithm tag is not `sha256`; a mismatched or
/// garbled digest is simply `false`.
pub fn verify(hash_string: &str, data: impl AsRef<[u8]>) -> Result<bool, HashError> {
    let algorithm = hash_string.split(':').next().unwrap_or_default();
    if algorithm != HASH_ALGORITHM {
        return Err(HashError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    Ok(hash(data) == hash_string)
}

/// Check a textual hash against a value's canonical encoding
pub fn verify_value(hash_string: &str, value: &Value) -> Result<bool, HashError> {
    let bytes = canonical::serialize(value)?;
    verify(hash_string, bytes)
}
