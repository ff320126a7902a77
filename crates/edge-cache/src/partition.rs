//! Versioned partitions and their lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use edge_core::{FetchRequest, WorkerConfig};
use edge_data::NetworkFetch;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::key::RequestIdentity;
use crate::policy::ResourceClass;
use crate::store::KeyedStore;

/// Build a versioned partition name: `{name}-v{version}`.
pub fn versioned_name(name: &str, version: &str) -> String {
    format!("{}-v{}", name, version)
}

/// The current versioned partition names.
///
/// The three names together are the whitelist: any other partition in the
/// store is stale and eligible for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSet {
    pub static_partition: String,
    pub dynamic_partition: String,
    pub image_partition: String,
}

impl PartitionSet {
    /// Partition names for the configured version.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let names = &config.partitions;
        Self {
            static_partition: versioned_name(&names.static_assets, &config.version),
            dynamic_partition: versioned_name(&names.dynamic, &config.version),
            image_partition: versioned_name(&names.image, &config.version),
        }
    }

    /// The partition a class is stored in. `api` shares the dynamic partition.
    pub fn for_class(&self, class: ResourceClass) -> &str {
        match class {
            ResourceClass::Static => &self.static_partition,
            ResourceClass::Image => &self.image_partition,
            ResourceClass::Api | ResourceClass::Dynamic => &self.dynamic_partition,
        }
    }

    /// All three names.
    pub fn names(&self) -> [&str; 3] {
        [
            self.static_partition.as_str(),
            self.dynamic_partition.as_str(),
            self.image_partition.as_str(),
        ]
    }

    /// The whitelist as a set.
    pub fn whitelist(&self) -> HashSet<String> {
        self.names().iter().map(|name| name.to_string()).collect()
    }
}

/// Owns partition existence over a [`KeyedStore`].
#[derive(Clone)]
pub struct PartitionManager {
    store: Arc<dyn KeyedStore>,
}

impl PartitionManager {
    /// Create a manager over a store.
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KeyedStore> {
        &self.store
    }

    /// Create every partition in `names` that does not exist yet.
    ///
    /// Stops at the first failure and returns it.
    pub async fn ensure_partitions(&self, names: &[&str]) -> CacheResult<()> {
        for name in names {
            self.store.open_partition(name).await?;
            tracing::debug!(partition = %name, "partition ready");
        }
        Ok(())
    }

    /// Fetch every URL and store the responses in `partition`.
    ///
    /// All-or-nothing: every fetch must succeed with a 2xx status before
    /// anything is written.
    pub async fn populate(
        &self,
        partition: &str,
        urls: &[String],
        fetch: &dyn NetworkFetch,
    ) -> CacheResult<usize> {
        let requests: Vec<FetchRequest> = urls.iter().map(FetchRequest::get).collect();
        let results = join_all(requests.iter().map(|request| fetch.fetch(request))).await;

        let mut responses = Vec::with_capacity(results.len());
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(response) if response.is_success() => responses.push((url, response)),
                Ok(response) => {
                    return Err(CacheError::Precache {
                        url: url.clone(),
                        reason: format!("status {}", response.status),
                    })
                }
                Err(e) => {
                    return Err(CacheError::Precache {
                        url: url.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        let handle = self.store.open_partition(partition).await?;
        for (url, response) in responses {
            handle.put(RequestIdentity::get(url), response).await?;
        }

        tracing::info!(partition = %partition, count = urls.len(), "precached assets");
        Ok(urls.len())
    }

    /// Delete every partition whose name is not in `whitelist`.
    ///
    /// Store failures are logged and skipped. Returns the deleted names.
    pub async fn purge_except(&self, whitelist: &HashSet<String>) -> Vec<String> {
        let names = match self.store.list_partition_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list partitions");
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| !whitelist.contains(name)) {
            match self.store.delete_partition(&name).await {
                Ok(true) => {
                    tracing::info!(partition = %name, "deleted stale partition");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(partition = %name, error = %e, "failed to delete partition");
                }
            }
        }

        deleted
    }

    /// Periodic backstop for partitions left behind by interrupted activations.
    pub async fn sweep_orphans(&self, whitelist: &HashSet<String>) -> Vec<String> {
        let deleted = self.purge_except(whitelist).await;
        if deleted.is_empty() {
            tracing::debug!("sweep found no orphaned partitions");
        } else {
            tracing::info!(count = deleted.len(), "sweep removed orphaned partitions");
        }
        deleted
    }
}
