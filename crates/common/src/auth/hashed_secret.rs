//! Short-lived bearer tokens derived from a shared secret
//!
//! A token is `"<unixSeconds>:<bcrypt hash>"`, where the hash is over
//! `"<unixSeconds>:<target canonical host>:<shared secret>"`. It can be
//! produced on a shell with standard tools:
//!
//! ```text
//! t=$(date +%s); echo $t$(htpasswd -bnB '' "$t:${CANONICAL_HOST}:${SHARED_SECRET}")
//! ```
//!
//! Tokens are accepted inside a window around their issue time. There is no
//! replay protection: a captured token is valid for the whole window.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::secrets::SharedSecret;

pub const DEFAULT_ACCEPT_PAST_SECS: i64 = 60;
pub const DEFAULT_ACCEPT_FUTURE_SECS: i64 = 60;
/// bcrypt only reads this many password bytes; longer inputs are refused
pub const MAX_PASSWORD_LEN: usize = 72;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no secret set")]
    MissingSecret,
    #[error("no target canonical host set")]
    MissingTarget,
    #[error("no token")]
    NoToken,
    #[error("malformed token ({0})")]
    MalformedToken(&'static str),
    #[error("invalid token")]
    InvalidToken,
    #[error("token password is {0} bytes, over the {MAX_PASSWORD_LEN} byte bcrypt limit")]
    PasswordTooLong(usize),
    #[error("token expired")]
    Expired,
    #[error("token is from the future")]
    FromFuture,
    #[error("failed to hash token: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("failed to build auth header: {0}")]
    Header(String),
}

/// Token generation and verification parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashedSecretScheme {
    cost: u32,
    accept_past: Duration,
    accept_future: Duration,
}

impl Default for HashedSecretScheme {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
            accept_past: Duration::seconds(DEFAULT_ACCEPT_PAST_SECS),
            accept_future: Duration::seconds(DEFAULT_ACCEPT_FUTURE_SECS),
        }
    }
}

impl HashedSecretScheme {
    /// bcrypt cost used when generating tokens; verification reads the
    /// cost from the token itself
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// How old (`past`) or how far ahead of our clock (`future`) a token's
    /// issue time may be
    ///
    /// `past` bounds tokens issued before `now`: `issued < now - past` is
    /// [`TokenError::Expired`]. `future` bounds tokens issued after `now`:
    /// `issued > now + future` is [`TokenError::FromFuture`].
    pub fn with_window(mut self, past: Duration, future: Duration) -> Self {
        self.accept_past = past;
        self.accept_future = future;
        self
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn generate(
        &self,
        now: DateTime<Utc>,
        target_host: &str,
        secret: &str,
    ) -> Result<String, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if target_host.is_empty() {
            return Err(TokenError::MissingTarget);
        }
        let issued = now.timestamp();
        let hashed = bcrypt::hash(format_password(issued, target_host, secret)?, self.cost)?;
        Ok(format!("{}:{}", issued, hashed))
    }

    /// Verify `token` against a single secret
    pub fn verify_secret(
        &self,
        now: DateTime<Utc>,
        token: &str,
        host: &str,
        secret: &str,
    ) -> Result<(), TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if host.is_empty() {
            return Err(TokenError::MissingTarget);
        }
        let (issued, hash) = parse_token(token)?;
        if !hash_matches(issued, hash, host, secret)? {
            return Err(TokenError::InvalidToken);
        }
        self.check_window(now, issued)
    }

    /// Verify `token` against each candidate in order
    ///
    /// Returns the first secret the token was made with. The time window is
    /// only checked for that secret.
    pub fn verify<'a>(
        &self,
        now: DateTime<Utc>,
        token: &str,
        host: &str,
        candidates: &'a [SharedSecret],
    ) -> Result<&'a SharedSecret, TokenError> {
        if host.is_empty() {
            return Err(TokenError::MissingTarget);
        }
        if candidates.iter().all(|c| c.secret.is_empty()) {
            return Err(TokenError::MissingSecret);
        }
        let (issued, hash) = parse_token(token)?;
        for candidate in candidates.iter().filter(|c| !c.secret.is_empty()) {
            if hash_matches(issued, hash, host, &candidate.secret)? {
                self.check_window(now, issued)?;
                return Ok(candidate);
            }
        }
        Err(TokenError::InvalidToken)
    }

    fn check_window(&self, now: DateTime<Utc>, issued: i64) -> Result<(), TokenError> {
        let issued = Utc
            .timestamp_opt(issued, 0)
            .single()
            .ok_or(TokenError::MalformedToken("bad number"))?;
        let earliest = now.checked_sub_signed(self.accept_past);
        if earliest.map_or(false, |earliest| earliest > issued) {
            return Err(TokenError::Expired);
        }
        let latest = now.checked_add_signed(self.accept_future);
        if latest.map_or(false, |latest| latest < issued) {
            return Err(TokenError::FromFuture);
        }
        Ok(())
    }
}

fn format_password(issued: i64, host: &str, secret: &str) -> Result<String, TokenError> {
    let password = format!("{}:{}:{}", issued, host, secret);
    if password.len() > MAX_PASSWORD_LEN {
        return Err(TokenError::PasswordTooLong(password.len()));
    }
    Ok(password)
}

fn hash_matches(issued: i64, hash: &str, host: &str, secret: &str) -> Result<bool, TokenError> {
    let password = format_password(issued, host, secret)?;
    Ok(bcrypt::verify(password, hash).unwrap_or(false))
}

fn parse_token(token: &str) -> Result<(i64, &str), TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::NoToken);
    }
    let (number, hash) = token
        .split_once(':')
        .ok_or(TokenError::MalformedToken("bad format"))?;
    if number.is_empty()
        || !number.bytes().all(|b| b.is_ascii_digit())
        || hash.is_empty()
        || hash.contains('\n')
    {
        return Err(TokenError::MalformedToken("bad format"));
    }
    let issued = number
        .parse::<i64>()
        .map_err(|_| TokenError::MalformedToken("bad number"))?;
    Ok((issued, hash))
}

#[cfg(test)]
mod test {
    use super::*;

    const HOST: &str = "foo.bar.example.com:1234";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn fast() -> HashedSecretScheme {
        HashedSecretScheme::default().with_cost(4)
    }

    #[test]
    fn test_token_window() {
        let scheme = fast();
        let now = at(1234567890);
        let token = scheme.generate(now, HOST, "hunter2").unwrap();
        assert!(token.starts_with("1234567890:$2"));

        let plus_one = now + Duration::seconds(1);
        scheme.verify_secret(plus_one, &token, HOST, "hunter2").unwrap();

        let plus_week = now + Duration::days(7);
        let err = scheme
            .verify_secret(plus_week, &token, HOST, "hunter2")
            .unwrap_err();
        assert_eq!(err.to_string(), "token expired");

        let minus_week = now - Duration::days(7);
        let err = scheme
            .verify_secret(minus_week, &token, HOST, "hunter2")
            .unwrap_err();
        assert_eq!(err.to_string(), "token is from the future");
    }

    #[test]
    fn test_default_cost() {
        let scheme = HashedSecretScheme::default();
        assert_eq!(scheme.cost(), bcrypt::DEFAULT_COST);
        let now = at(1234567890);
        let token = scheme.generate(now, HOST, "hunter2").unwrap();
        scheme
            .verify_secret(now + Duration::seconds(1), &token, HOST, "hunter2")
            .unwrap();
    }

    #[test]
    fn test_token_from_command_line() {
        let token = "1552517875:$2y$05$qL3A8ZqEhw/JiaKEAmvSCuYsjPL5JbzzrFai5YJG/WzE0/Y/ICoSe";
        HashedSecretScheme::default()
            .verify_secret(at(1552517878), token, "example.com:80", "hunter2")
            .unwrap();
    }

    #[test]
    fn test_wrong_secret_or_host() {
        let scheme = fast();
        let now = at(1234567890);
        let token = scheme.generate(now, HOST, "hunter2").unwrap();

        assert!(matches!(
            scheme.verify_secret(now, &token, HOST, "hunter3"),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            scheme.verify_secret(now, &token, "other.example.com", "hunter2"),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let scheme = fast();
        let now = at(1234567890);
        let check = |token: &str| scheme.verify_secret(now, token, HOST, "hunter2").unwrap_err();

        assert!(matches!(check("   "), TokenError::NoToken));
        assert!(matches!(check("nocolon"), TokenError::MalformedToken("bad format")));
        assert!(matches!(check("12a:hash"), TokenError::MalformedToken("bad format")));
        assert!(matches!(check("123:"), TokenError::MalformedToken("bad format")));
        assert!(matches!(
            check("99999999999999999999:hash"),
            TokenError::MalformedToken("bad number")
        ));
        assert!(matches!(check("123:not-a-bcrypt-hash"), TokenError::InvalidToken));
    }

    #[test]
    fn test_generate_requires_inputs() {
        let scheme = fast();
        assert!(matches!(
            scheme.generate(Utc::now(), HOST, ""),
            Err(TokenError::MissingSecret)
        ));
        assert!(matches!(
            scheme.generate(Utc::now(), "", "hunter2"),
            Err(TokenError::MissingTarget)
        ));
    }

    #[test]
    fn test_rotation_returns_matching_secret() {
        let scheme = fast();
        let now = at(1234567890);
        let secrets = vec![
            SharedSecret::new("new", "s3cret-new"),
            SharedSecret::new("old", "s3cret-old"),
        ];
        let token = scheme.generate(now, HOST, "s3cret-old").unwrap();

        let matched = scheme.verify(now, &token, HOST, &secrets).unwrap();
        assert_eq!(matched.name, "old");

        let token = scheme.generate(now, HOST, "unknown").unwrap();
        assert!(matches!(
            scheme.verify(now, &token, HOST, &secrets),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            scheme.verify(now, &token, HOST, &[]),
            Err(TokenError::MissingSecret)
        ));
    }

    #[test]
    fn test_long_passwords_are_refused() {
        let scheme = fast();
        let now = at(1234567890);
        let long_host = format!("{}.example.com", "a".repeat(50));
        let secrets = vec![SharedSecret::new("prod", "correct-horse-battery-staple")];

        assert!(matches!(
            scheme.generate(now, &long_host, "attacker-guess"),
            Err(TokenError::PasswordTooLong(_))
        ));

        // a token over the first 72 password bytes only, as bcrypt would
        // have produced had the password been silently truncated
        let prefix = format!("{}:{}:", now.timestamp(), long_host);
        let truncated: String = prefix.chars().take(MAX_PASSWORD_LEN).collect();
        let forged = format!(
            "{}:{}",
            now.timestamp(),
            bcrypt::hash(truncated, 4).unwrap()
        );
        assert!(matches!(
            scheme.verify(now, &forged, &long_host, &secrets),
            Err(TokenError::PasswordTooLong(_))
        ));
        assert!(matches!(
            scheme.verify_secret(now, &forged, &long_host, "correct-horse-battery-staple"),
            Err(TokenError::PasswordTooLong(_))
        ));

        // exactly at the limit still works
        let issued = now.timestamp().to_string();
        let host = "h".repeat(MAX_PASSWORD_LEN - issued.len() - 2 - "hunter2".len());
        let token = scheme.generate(now, &host, "hunter2").unwrap();
        scheme.verify_secret(now, &token, &host, "hunter2").unwrap();
        assert!(matches!(
            scheme.verify_secret(now, &token, &host, "hunter22"),
            Err(TokenError::PasswordTooLong(_))
        ));
    }

    #[test]
    fn test_window_is_configurable() {
        let scheme = fast().with_window(Duration::seconds(5), Duration::seconds(0));
        let now = at(1234567890);
        let token = scheme.generate(now, HOST, "hunter2").unwrap();

        scheme
            .verify_secret(now + Duration::seconds(5), &token, HOST, "hunter2")
            .unwrap();
        assert!(matches!(
            scheme.verify_secret(now + Duration::seconds(6), &token, HOST, "hunter2"),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            scheme.verify_secret(now - Duration::seconds(1), &token, HOST, "hunter2"),
            Err(TokenError::FromFuture)
        ));
    }
}
