//! Integration tests for trust context startup from a config file

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use ::common::auth::{AuthProvider, Gatekeeper, RequestContext};
use ::common::config::TrustConfig;
use ::common::context::{ContextError, TrustContext};
use ::common::keys::{KeyManager, MasterKeyResolver, PemFileMasterKeys};
use ::common::packet::{self, InMemoryRegistry, PublicKeyRegistry};
use tempfile::TempDir;

use crate::common::{key_manager, write_file, HOST_A, HOST_B, MASTER_KEY_URI};

fn version() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([("commit", "0123abc"), ("build", "release")])
}

/// Persistent keys for `owner` under a fresh pem-file master key
async fn persistent_keys(dir: &TempDir, owner: &str) -> std::path::PathBuf {
    let pem = KeyManager::generate_master_key_pem().unwrap();
    let pem_path = write_file(dir, "master.pem", pem.as_bytes());
    let manager = KeyManager::new(Arc::new(PemFileMasterKeys));
    let keys = manager.generate(owner).unwrap();
    let path = dir.path().join("keys.json");
    manager
        .write_encrypted_file(&keys, &PemFileMasterKeys::uri_for(&pem_path), &path)
        .await
        .unwrap();
    path
}

#[tokio::test]
async fn test_bootstrap_from_toml() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let keys_path = persistent_keys(&dir, HOST_A).await;

    let peer = ::common::keys::KeyPair::generate(HOST_B).unwrap();
    let registry_path = dir.path().join("public_keys.json");
    InMemoryRegistry::from_packets([peer.public_packet().clone()])
        .save(&registry_path)
        .await
        .unwrap();

    let secret_path = write_file(&dir, "outer.json", r#"{"name": "fleet", "secret": "hunter2"}"#);

    let config_path = write_file(
        &dir,
        "trust.toml",
        format!(
            r#"
            program_name = "svc"
            canonical_host = "{host}"
            keys_filename = {keys:?}
            public_keys_filename = {registry:?}
            outer_auth_secrets = [{secret:?}]
            "#,
            host = HOST_A,
            keys = keys_path.display().to_string(),
            registry = registry_path.display().to_string(),
            secret = secret_path.display().to_string(),
        ),
    );
    let config = TrustConfig::load(&config_path).await.unwrap();

    let resolver: Arc<dyn MasterKeyResolver> = Arc::new(PemFileMasterKeys);
    let ctx = TrustContext::bootstrap(&config, &version(), resolver)
        .await
        .unwrap();

    assert_eq!(ctx.keys().owner(), HOST_A);
    assert_eq!(ctx.registry().owners(), vec![HOST_B.to_string()]);
    assert!(ctx
        .realms()
        .main
        .description()
        .starts_with("HashedSecret[fleet"));

    // the context's provider produces headers its own gatekeeper accepts
    let provider = ctx.auth_provider().unwrap();
    let headers = provider
        .make_auth_headers(&RequestContext::new(HOST_A))
        .unwrap();
    let success = ctx.realms().main.check_auth(&headers).unwrap();
    assert_eq!(success.attempt.username.as_deref(), Some("fleet"));

    // the frozen identity claim is signed and verifiable by a peer that
    // knows our public keys
    let text = packet::pack_unencrypted(ctx.identity().claim(), ctx.keys()).unwrap();
    let peer_registry = InMemoryRegistry::from_packets([ctx.keys().public_packet().clone()]);
    let opened = packet::unpack_unencrypted(&text, &peer_registry).await.unwrap();
    assert_eq!(opened.sender(), HOST_A);
    assert!(ctx
        .public_key_registry()
        .lookup_public_keys(HOST_B)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_keys_owned_by_another_host() {
    let dir = TempDir::new().unwrap();
    let keys_path = persistent_keys(&dir, HOST_B).await;

    let mut config = TrustConfig::new("svc", HOST_A);
    config.keys_filename = Some(keys_path);

    let err = TrustContext::bootstrap(&config, "1.0", Arc::new(PemFileMasterKeys))
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::KeyOwnerMismatch { .. }));
    assert_eq!(
        err.to_string(),
        format!(
            "loaded keys owned by {:?}, but canonical host is {:?}",
            HOST_B, HOST_A
        )
    );
}

#[tokio::test]
async fn test_master_key_uri_override() {
    let dir = TempDir::new().unwrap();
    let (manager, masters) = key_manager();
    let keys = manager.generate(HOST_A).unwrap();
    let keys_path = dir.path().join("keys.json");
    manager
        .write_encrypted_file(&keys, MASTER_KEY_URI, &keys_path)
        .await
        .unwrap();

    // the packet records a URI; point it somewhere unresolvable and rely
    // on the configured override
    let mut packet: ::common::keys::PrivateKeyPacket =
        serde_json::from_str(&std::fs::read_to_string(&keys_path).unwrap()).unwrap();
    packet.master_key_uri = "memory://retired".to_string();
    std::fs::write(&keys_path, serde_json::to_vec(&packet).unwrap()).unwrap();

    let mut config = TrustConfig::new("svc", HOST_A);
    config.keys_filename = Some(keys_path);
    config.master_key_uri = Some(MASTER_KEY_URI.to_string());

    let ctx = TrustContext::bootstrap(&config, "1.0", masters)
        .await
        .unwrap();
    assert_eq!(ctx.keys().id(), keys.id());
}

#[tokio::test]
async fn test_htpasswd_realms() {
    let dir = TempDir::new().unwrap();
    let htpasswd = write_file(
        &dir,
        ".htpasswd",
        format!("ops:{}\n", bcrypt::hash("letmein", 4).unwrap()),
    );

    let mut config = TrustConfig::new("svc", HOST_A);
    config.debug_generate_keys = true;
    config.debug_htpasswd = vec![htpasswd.clone()];
    config.metrics_htpasswd = vec![htpasswd];

    let (_, masters) = key_manager();
    let ctx = TrustContext::bootstrap(&config, "1.0", masters)
        .await
        .unwrap();
    assert!(ctx.realms().debug.description().contains("a.example.com (debug)"));
    assert!(ctx
        .realms()
        .metrics
        .description()
        .contains("a.example.com (metrics)"));

    let mut challenge = http::HeaderMap::new();
    ctx.realms().debug.demand_auth(&mut challenge);
    assert_eq!(
        challenge.get(http::header::WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"a.example.com (debug)\""
    );

    let mut missing = config.clone();
    missing.metrics_htpasswd = vec![dir.path().join("nope")];
    let (_, masters) = key_manager();
    assert!(matches!(
        TrustContext::bootstrap(&missing, "1.0", masters).await,
        Err(ContextError::CredentialFile(_))
    ));
}
