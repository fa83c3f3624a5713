//! Master key resolution for envelope-encrypted private keys
//!
//! A [`MasterKeyResolver`] turns a master key URI into a [`WrappingKey`]
//! handle. The key manager only ever sees the handle, so a KMS client, a
//! local PEM file or an in-memory test key are interchangeable.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::crypto::MasterKey;

/// URI scheme understood by [`PemFileMasterKeys`]
pub const PEM_FILE_SCHEME: &str = "pem-file://";

#[derive(Debug, thiserror::Error)]
pub enum MasterKeyError {
    #[error("no master key resolver supports {0:?}")]
    Unsupported(String),
    #[error("master key {0:?} not found")]
    NotFound(String),
    #[error("failed to read master key {uri:?}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wrap under master key {uri:?}: {reason}")]
    Wrap { uri: String, reason: String },
    #[error("failed to unwrap under master key {uri:?}: {reason}")]
    Unwrap { uri: String, reason: String },
    #[error("master key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A resolved master key
#[async_trait]
pub trait WrappingKey: Send + Sync + std::fmt::Debug {
    /// The URI this key was resolved from
    fn uri(&self) -> &str;

    async fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, MasterKeyError>;

    async fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, MasterKeyError>;
}

#[async_trait]
pub trait MasterKeyResolver: Send + Sync + std::fmt::Debug {
    /// Whether this resolver is responsible for `uri`
    fn supports(&self, uri: &str) -> bool;

    async fn resolve(&self, uri: &str) -> Result<Arc<dyn WrappingKey>, MasterKeyError>;
}

/// A master key held in process memory, wrapping with AES-256-KW
#[derive(Debug)]
pub struct LocalWrappingKey {
    uri: String,
    key: MasterKey,
}

impl LocalWrappingKey {
    pub fn new(uri: impl Into<String>, key: MasterKey) -> Self {
        Self {
            uri: uri.into(),
            key,
        }
    }
}

#[async_trait]
impl WrappingKey for LocalWrappingKey {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn wrap(&self, plaintext: &[u8]) -> Result<Vec<u8>, MasterKeyError> {
        self.key.wrap(plaintext).map_err(|e| MasterKeyError::Wrap {
            uri: self.uri.clone(),
            reason: e.to_string(),
        })
    }

    async fn unwrap(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, MasterKeyError> {
        self.key.unwrap(wrapped).map_err(|e| MasterKeyError::Unwrap {
            uri: self.uri.clone(),
            reason: e.to_string(),
        })
    }
}

/// Master keys registered by exact URI
#[derive(Debug, Default)]
pub struct InMemoryMasterKeys {
    keys: RwLock<HashMap<String, MasterKey>>,
}

impl InMemoryMasterKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, key: MasterKey) {
        self.keys.write().insert(uri.into(), key);
    }

    /// Register a freshly generated key under `uri`
    pub fn generate(&self, uri: impl Into<String>) -> Result<(), MasterKeyError> {
        let key = MasterKey::generate().map_err(|e| anyhow::anyhow!("{}", e))?;
        self.insert(uri, key);
        Ok(())
    }
}

#[async_trait]
impl MasterKeyResolver for InMemoryMasterKeys {
    fn supports(&self, uri: &str) -> bool {
        self.keys.read().contains_key(uri)
    }

    async fn resolve(&self, uri: &str) -> Result<Arc<dyn WrappingKey>, MasterKeyError> {
        let key = self
            .keys
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| MasterKeyError::NotFound(uri.to_string()))?;
        Ok(Arc::new(LocalWrappingKey::new(uri, key)))
    }
}

/// Master keys stored as `MASTER KEY` PEM files, addressed as
/// `pem-file://<path>`
#[derive(Debug, Default, Clone, Copy)]
pub struct PemFileMasterKeys;

impl PemFileMasterKeys {
    pub fn uri_for(path: impl AsRef<Path>) -> String {
        format!("{}{}", PEM_FILE_SCHEME, path.as_ref().display())
    }
}

#[async_trait]
impl MasterKeyResolver for PemFileMasterKeys {
    fn supports(&self, uri: &str) -> bool {
        uri.starts_with(PEM_FILE_SCHEME)
    }

    async fn resolve(&self, uri: &str) -> Result<Arc<dyn WrappingKey>, MasterKeyError> {
        let path = uri
            .strip_prefix(PEM_FILE_SCHEME)
            .ok_or_else(|| MasterKeyError::Unsupported(uri.to_string()))?;
        let contents = Zeroizing::new(tokio::fs::read_to_string(path).await.map_err(|source| {
            MasterKeyError::Io {
                uri: uri.to_string(),
                source,
            }
        })?);
        let key = MasterKey::from_pem(&contents)
            .map_err(|e| anyhow::anyhow!("invalid master key file {:?}: {}", path, e))?;
        Ok(Arc::new(LocalWrappingKey::new(uri, key)))
    }
}

/// Dispatches each URI to the first resolver that supports it
#[derive(Debug, Default, Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn MasterKeyResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn MasterKeyResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

#[async_trait]
impl MasterKeyResolver for ResolverChain {
    fn supports(&self, uri: &str) -> bool {
        self.resolvers.iter().any(|r| r.supports(uri))
    }

    async fn resolve(&self, uri: &str) -> Result<Arc<dyn WrappingKey>, MasterKeyError> {
        match self.resolvers.iter().find(|r| r.supports(uri)) {
            Some(resolver) => resolver.resolve(uri).await,
            None => Err(MasterKeyError::Unsupported(uri.to_string())),
        }
    }
}
