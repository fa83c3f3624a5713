use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::hashed_secret::{DEFAULT_ACCEPT_FUTURE_SECS, DEFAULT_ACCEPT_PAST_SECS};
use crate::auth::HashedSecretScheme;

/// Startup configuration for a service's trust context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Program name recorded in the identity claim
    pub program_name: String,
    /// Owner id of this service; persistent keys must be owned by it
    pub canonical_host: String,
    /// Encrypted private key packet to load at startup
    #[serde(default)]
    pub keys_filename: Option<PathBuf>,
    /// Master key URI used instead of the one recorded in the key file
    #[serde(default)]
    pub master_key_uri: Option<String>,
    /// Generate throwaway keys instead of loading `keys_filename`
    #[serde(default)]
    pub debug_generate_keys: bool,
    /// JSON map of owner to public key packet
    #[serde(default)]
    pub public_keys_filename: Option<PathBuf>,
    #[serde(default)]
    pub outer_auth_secrets: Vec<PathBuf>,
    #[serde(default)]
    pub debug_htpasswd: Vec<PathBuf>,
    #[serde(default)]
    pub metrics_htpasswd: Vec<PathBuf>,
    #[serde(default)]
    pub disable_inbound_outer_auth: bool,
    #[serde(default)]
    pub disable_inbound_debug_outer_auth: bool,
    #[serde(default = "default_accept_past_secs")]
    pub token_accept_past_secs: i64,
    #[serde(default = "default_accept_future_secs")]
    pub token_accept_future_secs: i64,
}

fn default_accept_past_secs() -> i64 {
    DEFAULT_ACCEPT_PAST_SECS
}

fn default_accept_future_secs() -> i64 {
    DEFAULT_ACCEPT_FUTURE_SECS
}

impl TrustConfig {
    pub fn new(program_name: impl Into<String>, canonical_host: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            canonical_host: canonical_host.into(),
            keys_filename: None,
            master_key_uri: None,
            debug_generate_keys: false,
            public_keys_filename: None,
            outer_auth_secrets: Vec::new(),
            debug_htpasswd: Vec::new(),
            metrics_htpasswd: Vec::new(),
            disable_inbound_outer_auth: false,
            disable_inbound_debug_outer_auth: false,
            token_accept_past_secs: default_accept_past_secs(),
            token_accept_future_secs: default_accept_future_secs(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program_name.is_empty() {
            return Err(ConfigError::Invalid("program_name must be set".into()));
        }
        if self.canonical_host.is_empty() {
            return Err(ConfigError::Invalid("canonical_host must be set".into()));
        }
        match (&self.keys_filename, self.debug_generate_keys) {
            (Some(_), true) => Err(ConfigError::Invalid(
                "cannot specify both debug_generate_keys and keys_filename".into(),
            )),
            (None, false) => Err(ConfigError::Invalid(
                "missing keys_filename (or debug_generate_keys)".into(),
            )),
            _ => {
                if self.token_accept_past_secs < 0 || self.token_accept_future_secs < 0 {
                    return Err(ConfigError::Invalid(
                        "token acceptance window must not be negative".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// The token scheme for this config's acceptance window
    pub fn token_scheme(&self) -> HashedSecretScheme {
        HashedSecretScheme::default().with_window(
            Duration::seconds(self.token_accept_past_secs),
            Duration::seconds(self.token_accept_future_secs),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_from_toml() {
        let config = TrustConfig::from_toml_str(
            r#"
            program_name = "svc"
            canonical_host = "a.example.com"
            debug_generate_keys = true
            "#,
        )
        .unwrap();
        assert_eq!(config.token_accept_past_secs, 60);
        assert_eq!(config.token_accept_future_secs, 60);
        assert!(config.outer_auth_secrets.is_empty());
        assert!(!config.disable_inbound_outer_auth);
        assert_eq!(config.token_scheme(), HashedSecretScheme::default());
    }

    #[test]
    fn test_key_source_is_exclusive_and_required() {
        let mut config = TrustConfig::new("svc", "a.example.com");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.keys_filename = Some("keys.json".into());
        config.validate().unwrap();

        config.debug_generate_keys = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_required_names() {
        let mut config = TrustConfig::new("", "a.example.com");
        config.debug_generate_keys = true;
        assert!(config.validate().is_err());

        let mut config = TrustConfig::new("svc", "");
        config.debug_generate_keys = true;
        assert!(config.validate().is_err());

        assert!(matches!(
            TrustConfig::from_toml_str("program_name = \"svc\""),
            Err(ConfigError::TomlDe(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = TrustConfig::new("svc", "a.example.com");
        config.keys_filename = Some("/etc/svc/keys.json".into());
        config.outer_auth_secrets = vec!["/etc/svc/outer.json".into()];
        config.token_accept_past_secs = 300;
        let s = config.to_toml_string().unwrap();
        assert_eq!(TrustConfig::from_toml_str(&s).unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TrustConfig::load(dir.path().join("trust.toml")).await,
            Err(ConfigError::Io { .. })
        ));
    }
}
