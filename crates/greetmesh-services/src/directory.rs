//! Directory contract — where nodes publish and discover addresses.
//!
//! The directory is an external key-value store. Each node owns exactly one
//! record: key = its name, value = its listen address. Listing is a snapshot
//! of all records under a key prefix, in the store's key order.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use greetmesh_core::PeerIdentity;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("invalid directory address {0:?}")]
    InvalidAddress(String),
    #[error("directory unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("directory returned HTTP {status} for key {key:?}")]
    Status { status: u16, key: String },
    #[error("directory rejected write of key {0:?}")]
    Rejected(String),
}

/// A shared key-value registry of peer identities.
pub trait Directory: Send + Sync {
    /// Idempotent upsert of the caller's own record.
    fn register(
        &self,
        identity: &PeerIdentity,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Snapshot of every record whose key starts with `namespace`.
    fn list(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<PeerIdentity>, DirectoryError>> + Send;
}

// ── In-process directory ──────────────────────────────────────────────────────

/// Directory held in memory and shared by cloning.
///
/// Keys iterate in lexicographic order, the same order the HTTP directory
/// returns them in.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    records: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an arbitrary record, bypassing identity validation.
    pub async fn put_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.records.write().await.insert(key.into(), value.into());
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.records.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Directory for MemoryDirectory {
    async fn register(&self, identity: &PeerIdentity) -> Result<(), DirectoryError> {
        self.records
            .write()
            .await
            .insert(identity.name().to_string(), identity.address().to_string());
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<PeerIdentity>, DirectoryError> {
        let records = self.records.read().await;
        let peers = records
            .range(namespace.to_string()..)
            .take_while(|(key, _)| key.starts_with(namespace))
            .filter_map(|(key, value)| match PeerIdentity::new(key.as_str(), value.as_str()) {
                Ok(peer) => Some(peer),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping invalid directory record");
                    None
                }
            })
            .collect();
        Ok(peers)
    }
}
