use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::keys::PublicKeyPacket;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no public keys registered for {0:?}")]
    NotFound(String),
    #[error("registry backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Resolves an owner id to its published public keys
#[async_trait]
pub trait PublicKeyRegistry: Send + Sync + std::fmt::Debug {
    async fn lookup_public_keys(&self, owner: &str) -> Result<PublicKeyPacket, RegistryError>;
}

/// A registry held in memory, optionally backed by a JSON file mapping
/// owner to public key packet
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    packets: RwLock<HashMap<String, PublicKeyPacket>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_packets(packets: impl IntoIterator<Item = PublicKeyPacket>) -> Self {
        let registry = Self::new();
        for packet in packets {
            registry.publish(packet);
        }
        registry
    }

    /// Insert or replace the keys for `packet`'s owner
    pub fn publish(&self, packet: PublicKeyPacket) {
        self.packets
            .write()
            .insert(packet.metadata.owner.clone(), packet);
    }

    pub fn len(&self) -> usize {
        self.packets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.read().is_empty()
    }

    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.packets.read().keys().cloned().collect();
        owners.sort();
        owners
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read registry {:?}: {}", path, e))?;
        let entries: HashMap<String, PublicKeyPacket> = serde_json::from_slice(&data)
            .map_err(|e| anyhow::anyhow!("failed to parse registry {:?}: {}", path, e))?;

        for (owner, packet) in &entries {
            if owner != &packet.metadata.owner {
                return Err(anyhow::anyhow!(
                    "registry entry {:?} holds keys owned by {:?}",
                    owner,
                    packet.metadata.owner
                )
                .into());
            }
        }

        tracing::debug!(path = ?path, owners = entries.len(), "loaded public key registry");
        Ok(Self {
            packets: RwLock::new(entries),
        })
    }

    /// Write the registry as pretty JSON, keys in owner order
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let ordered: BTreeMap<String, PublicKeyPacket> = self
            .packets
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut data = serde_json::to_vec_pretty(&ordered)
            .map_err(|e| anyhow::anyhow!("failed to serialize registry: {}", e))?;
        data.push(b'\n');
        tokio::fs::write(path, data)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write registry {:?}: {}", path, e))?;
        Ok(())
    }
}

#[async_trait]
impl PublicKeyRegistry for InMemoryRegistry {
    async fn lookup_public_keys(&self, owner: &str) -> Result<PublicKeyPacket, RegistryError> {
        self.packets
            .read()
            .get(owner)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(owner.to_string()))
    }
}
