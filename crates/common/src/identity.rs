//! The identity a running service claims about itself
//!
//! Built in two phases: an [`IdentityBuilder`] is filled in during startup
//! (program, version, canonical host, key packets), then
//! [`IdentityBuilder::freeze`] validates it and yields an immutable
//! [`Identity`]. There is no way back from frozen to mutable.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::{self, SerializationError, Value};
use crate::keys::PublicKeyPacket;
use crate::packet::PublicArtifact;
use crate::timestamp;

/// Length of [`IdentityClaim::short_ephemeral_id`] in hex characters
pub const SHORT_EPHEMERAL_ID_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("program name not set")]
    MissingProgram,
    #[error("version info not set")]
    MissingVersion,
    #[error("canonical host not set")]
    MissingCanonicalHost,
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub timestamp: String,
    pub ephemeral_id: String,
    pub short_ephemeral_id: String,
    pub program: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_host: Option<String>,
    #[serde(default)]
    pub version: Value,
    #[serde(default)]
    pub ephemeral_public_keys: Option<PublicKeyPacket>,
    #[serde(default)]
    pub public_keys: Option<PublicKeyPacket>,
}

impl PublicArtifact for IdentityClaim {}

/// The mutable startup phase of an identity
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    claim: IdentityClaim,
}

impl IdentityBuilder {
    /// Start a claim for `program` with a fresh ephemeral id
    pub fn new(program: impl Into<String>) -> Self {
        let ephemeral_id = timestamp::unique_id();
        let short_ephemeral_id = short_id(&ephemeral_id);
        Self {
            claim: IdentityClaim {
                timestamp: timestamp::format(Utc::now()),
                ephemeral_id,
                short_ephemeral_id,
                program: program.into(),
                canonical_host: None,
                version: Value::Null,
                ephemeral_public_keys: None,
                public_keys: None,
            },
        }
    }

    pub fn version<T: Serialize + ?Sized>(mut self, version: &T) -> Result<Self, IdentityError> {
        self.claim.version = canonical::to_value(version)?;
        Ok(self)
    }

    pub fn canonical_host(mut self, host: impl Into<String>) -> Self {
        self.claim.canonical_host = Some(host.into());
        self
    }

    pub fn public_keys(mut self, packet: PublicKeyPacket) -> Self {
        self.claim.public_keys = Some(packet);
        self
    }

    pub fn ephemeral_public_keys(mut self, packet: PublicKeyPacket) -> Self {
        self.claim.ephemeral_public_keys = Some(packet);
        self
    }

    pub fn claim(&self) -> &IdentityClaim {
        &self.claim
    }

    /// Validate and seal the claim
    pub fn freeze(self) -> Result<Identity, IdentityError> {
        let claim = self.claim;
        if claim.program.is_empty() {
            return Err(IdentityError::MissingProgram);
        }
        if claim.version.is_null() {
            return Err(IdentityError::MissingVersion);
        }
        if claim.canonical_host.as_deref().map_or(true, str::is_empty) {
            return Err(IdentityError::MissingCanonicalHost);
        }

        tracing::info!(
            program = %claim.program,
            canonical_host = claim.canonical_host.as_deref().unwrap_or_default(),
            ephemeral_id = %claim.ephemeral_id,
            "identity finalised"
        );
        Ok(Identity(Arc::new(claim)))
    }
}

/// A validated, immutable identity claim
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(Arc<IdentityClaim>);

impl Identity {
    pub fn claim(&self) -> &IdentityClaim {
        &self.0
    }

    pub fn program(&self) -> &str {
        &self.0.program
    }

    pub fn canonical_host(&self) -> &str {
        self.0.canonical_host.as_deref().unwrap_or_default()
    }

    pub fn ephemeral_id(&self) -> &str {
        &self.0.ephemeral_id
    }
}

fn short_id(ephemeral_id: &str) -> String {
    let digest = Sha256::digest(ephemeral_id.as_bytes());
    let mut short = hex::encode(digest);
    short.truncate(SHORT_EPHEMERAL_ID_LEN);
    short
}
