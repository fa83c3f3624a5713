//! Startup wiring of identity, keys, registry and realm gatekeepers
//!
//! [`TrustContext::bootstrap`] runs the whole sequence once and hands back
//! an immutable context. Anything that needs the service's keys or
//! gatekeepers borrows them from here; there is no global state.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::{
    htpasswd_gatekeeper, AllowAll, AuthProvider, CredentialFileError, DenyAll, Gatekeeper,
    OuterAuth, SecretLoadError,
};
use crate::config::{ConfigError, TrustConfig};
use crate::identity::{Identity, IdentityBuilder, IdentityError};
use crate::keys::{KeyError, KeyManager, KeyPair, MasterKeyResolver};
use crate::packet::{InMemoryRegistry, PublicKeyRegistry, RegistryError};

/// Suffix appended to the canonical host to name ephemeral keys' owner
pub const EPHEMERAL_OWNER_SUFFIX: &str = "::ephemeral";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("failed to load keys: {0}")]
    Keys(#[from] KeyError),
    #[error("loaded keys owned by {owner:?}, but canonical host is {canonical_host:?}")]
    KeyOwnerMismatch {
        owner: String,
        canonical_host: String,
    },
    #[error("failed to load public key registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("failed to load outer auth secrets: {0}")]
    Secrets(#[from] SecretLoadError),
    #[error(transparent)]
    CredentialFile(#[from] CredentialFileError),
}

/// Gatekeepers for the three request realms a service exposes
#[derive(Debug, Clone)]
pub struct Realms {
    pub main: Arc<dyn Gatekeeper>,
    pub debug: Arc<dyn Gatekeeper>,
    pub metrics: Arc<dyn Gatekeeper>,
}

impl Realms {
    pub fn debug_realm(canonical_host: &str) -> String {
        format!("{} (debug)", canonical_host)
    }

    pub fn metrics_realm(canonical_host: &str) -> String {
        format!("{} (metrics)", canonical_host)
    }
}

#[derive(Debug, Clone)]
pub struct TrustContext {
    identity: Identity,
    keys: Arc<KeyPair>,
    ephemeral_keys: Arc<KeyPair>,
    registry: Arc<InMemoryRegistry>,
    key_manager: KeyManager,
    realms: Realms,
    provider: Option<Arc<dyn AuthProvider>>,
}

impl TrustContext {
    pub async fn bootstrap<V: Serialize + ?Sized>(
        config: &TrustConfig,
        version: &V,
        resolver: Arc<dyn MasterKeyResolver>,
    ) -> Result<Self, ContextError> {
        config.validate()?;
        let host = config.canonical_host.as_str();

        let builder = IdentityBuilder::new(&config.program_name)
            .version(version)?
            .canonical_host(host);

        let key_manager = KeyManager::new(resolver);
        let keys = match &config.keys_filename {
            Some(path) => {
                key_manager
                    .load_encrypted_file(path, config.master_key_uri.as_deref())
                    .await?
            }
            None => {
                tracing::warn!(
                    canonical_host = host,
                    "generating debug keys; they will not be persisted"
                );
                key_manager.generate(host)?
            }
        };
        if keys.owner() != host {
            return Err(ContextError::KeyOwnerMismatch {
                owner: keys.owner().to_string(),
                canonical_host: host.to_string(),
            });
        }

        let ephemeral_keys = key_manager.generate(format!("{}{}", host, EPHEMERAL_OWNER_SUFFIX))?;

        let registry = match &config.public_keys_filename {
            Some(path) => InMemoryRegistry::load(path).await?,
            None => InMemoryRegistry::new(),
        };

        let scheme = config.token_scheme();
        let outer_auth = if config.outer_auth_secrets.is_empty() {
            None
        } else {
            Some(OuterAuth::load(host, &config.outer_auth_secrets, scheme).await?)
        };

        let main: Arc<dyn Gatekeeper> = match (&outer_auth, config.disable_inbound_outer_auth) {
            (_, true) => Arc::new(AllowAll),
            (Some(auth), false) => Arc::new(auth.gatekeeper.clone()),
            (None, false) => Arc::new(DenyAll),
        };
        let debug: Arc<dyn Gatekeeper> = if config.disable_inbound_debug_outer_auth {
            Arc::new(AllowAll)
        } else {
            htpasswd_gatekeeper(&Realms::debug_realm(host), &config.debug_htpasswd)?
        };
        let metrics = htpasswd_gatekeeper(&Realms::metrics_realm(host), &config.metrics_htpasswd)?;
        let realms = Realms {
            main,
            debug,
            metrics,
        };
        tracing::debug!(
            main = %realms.main.description(),
            debug = %realms.debug.description(),
            metrics = %realms.metrics.description(),
            "realm gatekeepers"
        );

        let provider = outer_auth.map(|auth| Arc::new(auth.provider) as Arc<dyn AuthProvider>);

        let identity = builder
            .public_keys(keys.public_packet().clone())
            .ephemeral_public_keys(ephemeral_keys.public_packet().clone())
            .freeze()?;

        Ok(Self {
            identity,
            keys: Arc::new(keys),
            ephemeral_keys: Arc::new(ephemeral_keys),
            registry: Arc::new(registry),
            key_manager,
            realms,
            provider,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn ephemeral_keys(&self) -> &KeyPair {
        &self.ephemeral_keys
    }

    /// The loaded registry, for callers that publish new packets
    pub fn registry(&self) -> &InMemoryRegistry {
        &self.registry
    }

    pub fn public_key_registry(&self) -> Arc<dyn PublicKeyRegistry> {
        self.registry.clone()
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    pub fn realms(&self) -> &Realms {
        &self.realms
    }

    /// Outbound auth, present only when outer auth secrets are configured
    pub fn auth_provider(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.provider.as_ref()
    }
}
