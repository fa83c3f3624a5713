use std::fmt;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use super::hashed_secret::TokenError;

/// Who was checked, by what, and for which realm
///
/// Carried by every outcome, success or failure, so the caller can audit
/// the request without knowing which gatekeeper handled it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptInfo {
    pub gatekeeper_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Whether the request presented credentials this gatekeeper understands
    #[serde(default)]
    pub attempted: bool,
}

impl AttemptInfo {
    pub fn new(gatekeeper_id: impl Into<String>) -> Self {
        Self {
            gatekeeper_id: gatekeeper_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSuccess {
    pub attempt: AttemptInfo,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The request did not carry acceptable credentials
    #[error("permission denied")]
    Denied { attempt: AttemptInfo },
    /// The check itself could not be completed
    #[error("{message}")]
    Fault {
        attempt: AttemptInfo,
        message: String,
    },
}

impl AuthError {
    pub fn denied(attempt: AttemptInfo) -> Self {
        Self::Denied { attempt }
    }

    pub fn fault(attempt: AttemptInfo, message: impl Into<String>) -> Self {
        Self::Fault {
            attempt,
            message: message.into(),
        }
    }

    pub fn attempt(&self) -> &AttemptInfo {
        match self {
            Self::Denied { attempt } | Self::Fault { attempt, .. } => attempt,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

pub type AuthResult = Result<AuthSuccess, AuthError>;

/// A request authentication check
pub trait Gatekeeper: Send + Sync + fmt::Debug {
    fn check_auth(&self, headers: &HeaderMap) -> AuthResult;

    /// Add whatever challenge headers a rejected response should carry
    fn demand_auth(&self, headers: &mut HeaderMap);

    fn description(&self) -> String;
}

/// The outbound request an [`AuthProvider`] is producing headers for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub recipient_host: String,
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(recipient_host: impl Into<String>) -> Self {
        Self {
            recipient_host: recipient_host.into(),
            request_time: Utc::now(),
        }
    }
}

/// Attaches credentials to outbound requests
pub trait AuthProvider: Send + Sync + fmt::Debug {
    fn make_auth_headers(&self, ctx: &RequestContext) -> Result<HeaderMap, TokenError>;
}
