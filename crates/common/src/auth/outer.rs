//! Hashed-secret bearer tokens carried in a custom header
//!
//! Requests carry `X-Authorization: OrcOuterAuth <token>`. The gatekeeper
//! accepts a token made with any configured secret for our canonical host;
//! the provider makes tokens with the first configured secret for the
//! recipient's host.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue};

use super::hashed_secret::{HashedSecretScheme, TokenError};
use super::secrets::{load_secrets, SecretLoadError, SharedSecret};
use super::types::{
    AttemptInfo, AuthError, AuthProvider, AuthResult, AuthSuccess, Gatekeeper, RequestContext,
};

/// Header carrying outer auth tokens (lowercase, as `http` normalizes it)
pub const OUTER_AUTH_HEADER: &str = "x-authorization";
pub const OUTER_AUTH_SCHEME: &str = "OrcOuterAuth";
pub const OUTER_AUTH_GATEKEEPER_ID: &str = "OrcOuterAuth";
/// Upper bound on scheme-tagged header values checked per request
pub const MAX_ATTEMPTS: usize = 3;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Gatekeeper for the `X-Authorization` hashed-secret scheme
#[derive(Clone)]
pub struct HashedSecretHeader {
    canonical_host: String,
    secrets: Arc<[SharedSecret]>,
    scheme: HashedSecretScheme,
    clock: Clock,
}

impl fmt::Debug for HashedSecretHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedSecretHeader")
            .field("canonical_host", &self.canonical_host)
            .field("secrets", &self.secrets)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl HashedSecretHeader {
    pub fn new(
        canonical_host: impl Into<String>,
        secrets: Vec<SharedSecret>,
        scheme: HashedSecretScheme,
    ) -> Self {
        Self {
            canonical_host: canonical_host.into(),
            secrets: secrets.into(),
            scheme,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to judge token age
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn secrets(&self) -> &[SharedSecret] {
        &self.secrets
    }
}

impl Gatekeeper for HashedSecretHeader {
    fn check_auth(&self, headers: &HeaderMap) -> AuthResult {
        let tokens: Vec<&str> = headers
            .get_all(OUTER_AUTH_HEADER)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split_once(' '))
            .filter(|(scheme, _)| *scheme == OUTER_AUTH_SCHEME)
            .map(|(_, token)| token)
            .collect();

        let mut attempt = AttemptInfo::new(OUTER_AUTH_GATEKEEPER_ID);
        attempt.attempted = !tokens.is_empty();

        if !attempt.attempted {
            return Err(AuthError::denied(attempt));
        }
        if tokens.len() > MAX_ATTEMPTS {
            return Err(AuthError::fault(
                attempt,
                "too many \"X-Authorization\" header values",
            ));
        }

        let now = (self.clock)();
        for token in tokens {
            if let Ok(secret) = self
                .scheme
                .verify(now, token, &self.canonical_host, &self.secrets)
            {
                if !secret.name.is_empty() {
                    attempt.username = Some(secret.name.clone());
                }
                return Ok(AuthSuccess { attempt });
            }
        }

        Err(AuthError::denied(attempt))
    }

    fn demand_auth(&self, _headers: &mut HeaderMap) {}

    fn description(&self) -> String {
        let secrets: Vec<String> = self
            .secrets
            .iter()
            .map(|secret| {
                let mut label = if secret.name.is_empty() {
                    "(unnamed secret)".to_string()
                } else {
                    secret.name.clone()
                };
                if !secret.timestamp.is_empty() {
                    label.push('@');
                    label.push_str(&secret.timestamp);
                }
                label
            })
            .collect();
        format!("HashedSecret[{}]", secrets.join(","))
    }
}

/// Makes outbound tokens with the primary secret
#[derive(Debug, Clone)]
pub struct HashedSecretProvider {
    primary: SharedSecret,
    scheme: HashedSecretScheme,
}

impl HashedSecretProvider {
    pub fn new(primary: SharedSecret, scheme: HashedSecretScheme) -> Self {
        Self { primary, scheme }
    }
}

impl AuthProvider for HashedSecretProvider {
    fn make_auth_headers(&self, ctx: &RequestContext) -> Result<HeaderMap, TokenError> {
        let token = self
            .scheme
            .generate(ctx.request_time, &ctx.recipient_host, &self.primary.secret)?;
        let value = HeaderValue::from_str(&format!("{} {}", OUTER_AUTH_SCHEME, token))
            .map_err(|e| TokenError::Header(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(OUTER_AUTH_HEADER), value);
        Ok(headers)
    }
}

/// The inbound gatekeeper and outbound provider for one set of secrets
#[derive(Debug, Clone)]
pub struct OuterAuth {
    pub gatekeeper: HashedSecretHeader,
    pub provider: HashedSecretProvider,
}

impl OuterAuth {
    pub fn new(
        canonical_host: impl Into<String>,
        secrets: Vec<SharedSecret>,
        scheme: HashedSecretScheme,
    ) -> Result<Self, SecretLoadError> {
        let primary = secrets.first().cloned().ok_or(SecretLoadError::NoSecrets)?;
        Ok(Self {
            gatekeeper: HashedSecretHeader::new(canonical_host, secrets, scheme),
            provider: HashedSecretProvider::new(primary, scheme),
        })
    }

    pub async fn load<P: AsRef<Path>>(
        canonical_host: impl Into<String>,
        paths: &[P],
        scheme: HashedSecretScheme,
    ) -> Result<Self, SecretLoadError> {
        let secrets = load_secrets(paths).await?;
        Self::new(canonical_host, secrets, scheme)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    const HOST: &str = "b.example.com";

    fn fixed_clock(secs: i64) -> Clock {
        Arc::new(move || Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn outer_auth() -> OuterAuth {
        let scheme = HashedSecretScheme::default().with_cost(4);
        OuterAuth::new(
            HOST,
            vec![
                SharedSecret::new("primary", "s3cret-1"),
                SharedSecret::new("", "s3cret-2"),
            ],
            scheme,
        )
        .unwrap()
    }

    fn request_with(values: &[String]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(OUTER_AUTH_HEADER, value.parse().unwrap());
        }
        headers
    }

    #[test]
    fn test_provider_headers_pass_gatekeeper() {
        let auth = outer_auth();
        let ctx = RequestContext {
            recipient_host: HOST.to_string(),
            request_time: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
        };
        let headers = auth.provider.make_auth_headers(&ctx).unwrap();
        assert!(headers
            .get("X-Authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("OrcOuterAuth 1600000000:"));

        let gatekeeper = auth.gatekeeper.with_clock(fixed_clock(1_600_000_010));
        let success = gatekeeper.check_auth(&headers).unwrap();
        assert_eq!(success.attempt.gatekeeper_id, "OrcOuterAuth");
        assert_eq!(success.attempt.username.as_deref(), Some("primary"));
        assert!(success.attempt.attempted);
    }

    #[test]
    fn test_no_attempt_is_denied() {
        let gatekeeper = outer_auth().gatekeeper;
        let err = gatekeeper
            .check_auth(&request_with(&["Bearer abc".to_string()]))
            .unwrap_err();
        assert!(err.is_denied());
        assert!(!err.attempt().attempted);

        let err = gatekeeper.check_auth(&HeaderMap::new()).unwrap_err();
        assert!(!err.attempt().attempted);
    }

    #[test]
    fn test_too_many_values_is_a_fault() {
        let gatekeeper = outer_auth().gatekeeper;
        let values: Vec<String> = (0..4).map(|i| format!("OrcOuterAuth {}:x", i)).collect();
        let err = gatekeeper.check_auth(&request_with(&values)).unwrap_err();
        assert!(!err.is_denied());
        assert!(err.attempt().attempted);
    }

    #[test]
    fn test_bad_tokens_are_denied() {
        let auth = outer_auth();
        let scheme = HashedSecretScheme::default().with_cost(4);
        let now = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let stale = scheme.generate(now, HOST, "s3cret-1").unwrap();
        let wrong_host = scheme.generate(now, "c.example.com", "s3cret-1").unwrap();

        let gatekeeper = auth.gatekeeper.with_clock(fixed_clock(1_600_003_600));
        let err = gatekeeper
            .check_auth(&request_with(&[
                format!("OrcOuterAuth {}", stale),
                format!("OrcOuterAuth {}", wrong_host),
                "OrcOuterAuth garbage".to_string(),
            ]))
            .unwrap_err();
        assert!(err.is_denied());
        assert!(err.attempt().attempted);
    }

    #[test]
    fn test_second_secret_accepted() {
        let auth = outer_auth();
        let scheme = HashedSecretScheme::default().with_cost(4);
        let now = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let token = scheme.generate(now, HOST, "s3cret-2").unwrap();

        let gatekeeper = auth.gatekeeper.with_clock(fixed_clock(1_600_000_000));
        let success = gatekeeper
            .check_auth(&request_with(&[format!("OrcOuterAuth {}", token)]))
            .unwrap();
        assert_eq!(success.attempt.username, None);
    }

    #[test]
    fn test_description() {
        let mut secrets = vec![SharedSecret::new("a", "1"), SharedSecret::new("", "2")];
        secrets[0].timestamp = "2019-03-13".to_string();
        let gatekeeper = HashedSecretHeader::new(HOST, secrets, HashedSecretScheme::default());
        assert_eq!(
            gatekeeper.description(),
            "HashedSecret[a@2019-03-13,(unnamed secret)]"
        );
    }

    #[test]
    fn test_long_host_never_authenticates() {
        let long_host = format!("{}.example.com", "b".repeat(50));
        let scheme = HashedSecretScheme::default().with_cost(4);
        let auth = OuterAuth::new(
            long_host.clone(),
            vec![SharedSecret::new("prod", "correct-horse-battery-staple")],
            scheme,
        )
        .unwrap();

        assert!(matches!(
            auth.provider
                .make_auth_headers(&RequestContext::new(long_host.clone())),
            Err(TokenError::PasswordTooLong(_))
        ));

        let now = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let prefix = format!("{}:{}:", now.timestamp(), long_host);
        let truncated: String = prefix.chars().take(72).collect();
        let forged = format!("{}:{}", now.timestamp(), bcrypt::hash(truncated, 4).unwrap());
        let gatekeeper = auth.gatekeeper.with_clock(fixed_clock(1_600_000_000));
        let err = gatekeeper
            .check_auth(&request_with(&[format!("OrcOuterAuth {}", forged)]))
            .unwrap_err();
        assert!(err.is_denied());
    }

    #[test]
    fn test_no_secrets_rejected() {
        assert!(matches!(
            OuterAuth::new(HOST, vec![], HashedSecretScheme::default()),
            Err(SecretLoadError::NoSecrets)
        ));
    }
}
