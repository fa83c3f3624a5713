use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, thiserror::Error)]
pub enum SecretLoadError {
    #[error("error loading secret from {path:?}: read error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error loading secret from {path:?}: JSON unmarshal error: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("error loading secret from {path:?}: unrecognized format")]
    UnrecognizedFormat { path: PathBuf },
    #[error("no secrets loaded")]
    NoSecrets,
}

/// One configured bearer-token secret
///
/// Several may be configured at once to allow rotation; they are tried in
/// order. `name` is reported as the authenticated username.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(default)]
    pub secret: String,
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("name", &self.name)
            .field("timestamp", &self.timestamp)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// On-disk shape; `hashedsecret` is the older name of `secret`
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct SecretRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    secret: String,
    #[serde(default)]
    hashedsecret: String,
}

impl SharedSecret {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: String::new(),
            secret: secret.into(),
        }
    }

    /// Parse a secret file's contents; `path` names secrets that have no
    /// name of their own
    pub fn from_json(data: &[u8], path: &Path) -> Result<Self, SecretLoadError> {
        let record: SecretRecord =
            serde_json::from_slice(data).map_err(|source| SecretLoadError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let secret = if !record.secret.is_empty() {
            record.secret.clone()
        } else if !record.hashedsecret.is_empty() {
            record.hashedsecret.clone()
        } else {
            return Err(SecretLoadError::UnrecognizedFormat {
                path: path.to_path_buf(),
            });
        };

        let name = if record.name.is_empty() {
            path.display().to_string()
        } else {
            record.name.clone()
        };

        Ok(Self {
            name,
            timestamp: record.timestamp.clone(),
            secret,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SecretLoadError> {
        let path = path.as_ref();
        let data = zeroize::Zeroizing::new(tokio::fs::read(path).await.map_err(|source| {
            SecretLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?);
        Self::from_json(&data, path)
    }
}

/// Load every secret file, in order
pub async fn load_secrets<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SharedSecret>, SecretLoadError> {
    let mut secrets = Vec::with_capacity(paths.len());
    for path in paths {
        secrets.push(SharedSecret::load(path).await?);
    }
    Ok(secrets)
}
