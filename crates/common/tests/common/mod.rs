//! Shared test utilities for trust core integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::keys::{InMemoryMasterKeys, KeyManager, KeyPair, MasterKeyResolver};
use common::packet::InMemoryRegistry;
use tempfile::TempDir;

pub const HOST_A: &str = "a.example.com";
pub const HOST_B: &str = "b.example.com";
pub const MASTER_KEY_URI: &str = "memory://test-master";

/// Two services with fresh keys and a registry that knows both
pub fn two_services() -> (KeyPair, KeyPair, InMemoryRegistry) {
    let a = KeyPair::generate(HOST_A).unwrap();
    let b = KeyPair::generate(HOST_B).unwrap();
    let registry = InMemoryRegistry::from_packets([
        a.public_packet().clone(),
        b.public_packet().clone(),
    ]);
    (a, b, registry)
}

/// A key manager backed by one in-memory master key at [`MASTER_KEY_URI`]
pub fn key_manager() -> (KeyManager, Arc<InMemoryMasterKeys>) {
    let masters = Arc::new(InMemoryMasterKeys::new());
    masters.generate(MASTER_KEY_URI).unwrap();
    let resolver: Arc<dyn MasterKeyResolver> = masters.clone();
    (KeyManager::new(resolver), masters)
}

pub fn write_file(dir: &TempDir, name: &str, contents: impl AsRef<[u8]>) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Install a fmt subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
