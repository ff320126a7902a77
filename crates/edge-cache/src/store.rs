//! Storage capability and the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::ResponseSnapshot;
use tokio::sync::RwLock;

use crate::error::CacheResult;
use crate::key::{CacheEntry, RequestIdentity};

/// A namespaced, asynchronous key to response store.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Open a partition, creating it if it does not exist.
    async fn open_partition(&self, name: &str) -> CacheResult<Arc<dyn PartitionHandle>>;

    /// Check whether a partition exists without creating it.
    async fn has_partition(&self, name: &str) -> CacheResult<bool>;

    /// Names of every existing partition.
    async fn list_partition_names(&self) -> CacheResult<Vec<String>>;

    /// Delete a partition. Returns `false` if it did not exist.
    async fn delete_partition(&self, name: &str) -> CacheResult<bool>;
}

/// An open partition.
#[async_trait]
pub trait PartitionHandle: Send + Sync {
    /// Look up an entry.
    async fn get(&self, identity: &RequestIdentity) -> CacheResult<Option<CacheEntry>>;

    /// Store a response, replacing any prior entry for the identity.
    async fn put(&self, identity: RequestIdentity, response: ResponseSnapshot) -> CacheResult<()>;

    /// Identities of every stored entry.
    async fn identities(&self) -> CacheResult<Vec<RequestIdentity>>;
}

/// In-memory store (for development/testing and the CLI host).
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Arc<MemoryPartition>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn open_partition(&self, name: &str) -> CacheResult<Arc<dyn PartitionHandle>> {
        if let Some(partition) = self.partitions.read().await.get(name) {
            return Ok(partition.clone() as Arc<dyn PartitionHandle>);
        }

        let mut partitions = self.partitions.write().await;
        let partition = partitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryPartition::default()))
            .clone();
        Ok(partition as Arc<dyn PartitionHandle>)
    }

    async fn has_partition(&self, name: &str) -> CacheResult<bool> {
        Ok(self.partitions.read().await.contains_key(name))
    }

    async fn list_partition_names(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.partitions.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_partition(&self, name: &str) -> CacheResult<bool> {
        Ok(self.partitions.write().await.remove(name).is_some())
    }
}

/// A partition held by [`MemoryStore`].
#[derive(Default)]
pub struct MemoryPartition {
    entries: RwLock<HashMap<RequestIdentity, CacheEntry>>,
}

#[async_trait]
impl PartitionHandle for MemoryPartition {
    async fn get(&self, identity: &RequestIdentity) -> CacheResult<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(identity).cloned())
    }

    async fn put(&self, identity: RequestIdentity, response: ResponseSnapshot) -> CacheResult<()> {
        let entry = CacheEntry::new(identity.clone(), response);
        self.entries.write().await.insert(identity, entry);
        Ok(())
    }

    async fn identities(&self) -> CacheResult<Vec<RequestIdentity>> {
        let mut identities: Vec<RequestIdentity> =
            self.entries.read().await.keys().cloned().collect();
        identities.sort();
        Ok(identities)
    }
}
