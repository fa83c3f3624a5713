//! Username/password checks against an external credential file
//!
//! The backend is treated as untrusted code: errors and panics raised while
//! checking a request become [`AuthError::Fault`] with the usual
//! [`AttemptInfo`], never a raw error or an unwinding panic.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue};

use super::basic::{AnyOf, DenyAll};
use super::types::{AttemptInfo, AuthError, AuthResult, AuthSuccess, Gatekeeper};

#[derive(Debug, thiserror::Error)]
pub enum CredentialFileError {
    #[error("error reading credential file {path:?} (for realm {realm:?}): {reason}")]
    Load {
        path: PathBuf,
        realm: String,
        reason: String,
    },
}

/// A source of username/password verdicts
pub trait CredentialBackend: Send + Sync + fmt::Debug {
    /// Whether `password` is correct for `username`; unknown users are
    /// `Ok(false)`
    fn verify(&self, username: &str, password: &str) -> anyhow::Result<bool>;
}

/// An Apache-style htpasswd file with bcrypt entries
#[derive(Debug, Clone)]
pub struct HtpasswdFile {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl HtpasswdFile {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {:?}: {}", path, e))?;
        Self::parse(path, &contents)
    }

    pub fn parse(path: impl AsRef<Path>, contents: &str) -> anyhow::Result<Self> {
        let mut entries = HashMap::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (user, hash) = line
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("line {}: expected user:hash", lineno + 1))?;
            entries.insert(user.to_string(), hash.to_string());
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for HtpasswdFile {
    fn verify(&self, username: &str, password: &str) -> anyhow::Result<bool> {
        let Some(hash) = self.entries.get(username) else {
            return Ok(false);
        };
        if !(hash.starts_with("$2y$") || hash.starts_with("$2b$") || hash.starts_with("$2a$")) {
            return Err(anyhow::anyhow!(
                "unsupported password hash for user {:?}",
                username
            ));
        }
        Ok(bcrypt::verify(password, hash)?)
    }
}

/// HTTP Basic auth checked against a [`CredentialBackend`]
#[derive(Debug, Clone)]
pub struct CredentialFile {
    gatekeeper_id: String,
    filename: String,
    realm: String,
    backend: Arc<dyn CredentialBackend>,
}

impl CredentialFile {
    pub fn new(
        filename: impl Into<String>,
        realm: impl Into<String>,
        backend: Arc<dyn CredentialBackend>,
    ) -> Self {
        let filename = filename.into();
        let realm = realm.into();
        Self {
            gatekeeper_id: format!("htpasswd({:?}, {:?})", filename, realm),
            filename,
            realm,
            backend,
        }
    }

    /// Open an htpasswd file, failing early if it cannot be read or parsed
    pub fn htpasswd(path: impl AsRef<Path>, realm: impl Into<String>) -> Result<Self, CredentialFileError> {
        let path = path.as_ref();
        let realm = realm.into();
        let backend = HtpasswdFile::open(path).map_err(|e| CredentialFileError::Load {
            path: path.to_path_buf(),
            realm: realm.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(
            path.display().to_string(),
            realm,
            Arc::new(backend),
        ))
    }

    pub fn gatekeeper_id(&self) -> &str {
        &self.gatekeeper_id
    }
}

impl Gatekeeper for CredentialFile {
    fn check_auth(&self, headers: &HeaderMap) -> AuthResult {
        let credentials = basic_credentials(headers);
        let mut attempt = AttemptInfo::new(self.gatekeeper_id.clone());
        attempt.realm = Some(self.realm.clone());
        attempt.attempted = credentials.is_some();
        attempt.username = credentials.as_ref().map(|(user, _)| user.clone());

        let Some((username, password)) = credentials else {
            return Err(AuthError::denied(attempt));
        };

        let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.verify(&username, &password)
        }));
        let fault = |reason: String| {
            format!(
                "error checking auth from credential file {:?} (for realm {:?}): {}",
                self.filename, self.realm, reason
            )
        };

        match verdict {
            Ok(Ok(true)) => Ok(AuthSuccess { attempt }),
            Ok(Ok(false)) => Err(AuthError::denied(attempt)),
            Ok(Err(e)) => Err(AuthError::fault(attempt, fault(e.to_string()))),
            Err(payload) => Err(AuthError::fault(attempt, fault(panic_message(&*payload)))),
        }
    }

    fn demand_auth(&self, headers: &mut HeaderMap) {
        match HeaderValue::from_str(&format!("Basic realm={:?}", self.realm)) {
            Ok(value) => {
                headers.insert(WWW_AUTHENTICATE, value);
            }
            Err(e) => {
                tracing::warn!(realm = %self.realm, error = %e, "realm is not a valid header value");
            }
        }
    }

    fn description(&self) -> String {
        format!("Htpasswd[{}]", self.gatekeeper_id)
    }
}

/// A gatekeeper accepting any of the htpasswd `files` for `realm`
///
/// With no files every request is denied.
pub fn htpasswd_gatekeeper<P: AsRef<Path>>(
    realm: &str,
    files: &[P],
) -> Result<Arc<dyn Gatekeeper>, CredentialFileError> {
    if files.is_empty() {
        tracing::warn!(realm, "no htpasswd provided: denying all");
        return Ok(Arc::new(DenyAll));
    }
    let mut children: Vec<Arc<dyn Gatekeeper>> = Vec::with_capacity(files.len());
    for file in files {
        children.push(Arc::new(CredentialFile::htpasswd(file, realm)?));
    }
    Ok(Arc::new(AnyOf::new(children)))
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
