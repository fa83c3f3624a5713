use std::sync::Arc;

use http::HeaderMap;

use super::types::{AttemptInfo, AuthError, AuthResult, AuthSuccess, Gatekeeper};

pub const ALLOW_ALL_ID: &str = "AllowAll";
pub const DENY_ALL_ID: &str = "DenyAll";
pub const ANY_OF_ID: &str = "AnyOf";

/// Lets every request through
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Gatekeeper for AllowAll {
    fn check_auth(&self, _headers: &HeaderMap) -> AuthResult {
        Ok(AuthSuccess {
            attempt: AttemptInfo::new(ALLOW_ALL_ID),
        })
    }

    fn demand_auth(&self, _headers: &mut HeaderMap) {}

    fn description(&self) -> String {
        ALLOW_ALL_ID.to_string()
    }
}

/// Rejects every request, without a challenge
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Gatekeeper for DenyAll {
    fn check_auth(&self, _headers: &HeaderMap) -> AuthResult {
        Err(AuthError::denied(AttemptInfo::new(DENY_ALL_ID)))
    }

    fn demand_auth(&self, _headers: &mut HeaderMap) {}

    fn description(&self) -> String {
        DENY_ALL_ID.to_string()
    }
}

/// Accepts a request if any child accepts it
///
/// Children are tried in order and the first success wins. When every
/// child rejects, only the last child's error is returned; earlier
/// rejections are dropped. An empty `AnyOf` rejects everything.
#[derive(Debug, Clone, Default)]
pub struct AnyOf(Vec<Arc<dyn Gatekeeper>>);

impl AnyOf {
    pub fn new(children: Vec<Arc<dyn Gatekeeper>>) -> Self {
        Self(children)
    }

    pub fn children(&self) -> &[Arc<dyn Gatekeeper>] {
        &self.0
    }
}

impl Gatekeeper for AnyOf {
    fn check_auth(&self, headers: &HeaderMap) -> AuthResult {
        let mut last_err = AuthError::denied(AttemptInfo::new(ANY_OF_ID));
        for child in &self.0 {
            match child.check_auth(headers) {
                Ok(success) => return Ok(success),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn demand_auth(&self, headers: &mut HeaderMap) {
        for child in &self.0 {
            child.demand_auth(headers);
        }
    }

    fn description(&self) -> String {
        let children: Vec<String> = self.0.iter().map(|c| c.description()).collect();
        format!("AnyOf[{}]", children.join(","))
    }
}
