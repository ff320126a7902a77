//! Shared fakes for worker integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edge_cache::{
    CacheEntry, CacheError, CacheResult, KeyedStore, MemoryStore, PartitionHandle,
    RequestIdentity,
};
use edge_core::{FetchRequest, ResponseSnapshot, WorkerConfig};
use edge_data::{FetchError, NetworkFetch};
use edge_worker::{Dispatcher, LocalClients, ServiceWorker};

pub fn init_tracing() {
    edge_observability::init_test_logging();
}

/// Network fake answering `{url}#{n}` where `n` counts calls to that URL.
#[derive(Default)]
pub struct ScriptedFetch {
    calls: Mutex<HashMap<String, usize>>,
    statuses: Mutex<HashMap<String, u16>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `url` with `status` from now on.
    pub fn set_status(&self, url: &str, status: u16) {
        self.statuses.lock().unwrap().insert(url.to_string(), status);
    }

    /// Fail every fetch of `url`.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Fail every fetch.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Sleep before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl NetworkFetch for ScriptedFetch {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.url.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&request.url) {
            return Err(FetchError::Connection(format!("{} unreachable", request.url)));
        }

        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(&request.url)
            .copied()
            .unwrap_or(200);
        Ok(ResponseSnapshot::new(
            status,
            HashMap::new(),
            format!("{}#{}", request.url, n).into_bytes(),
        ))
    }
}

/// Store wrapper that fails selected operations.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    flags: Arc<FailFlags>,
}

#[derive(Default)]
pub struct FailFlags {
    pub open: AtomicBool,
    pub get: AtomicBool,
    pub put: AtomicBool,
    pub list: AtomicBool,
    pub delete: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn flags(&self) -> &FailFlags {
        &self.flags
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

fn storage_error(op: &str) -> CacheError {
    CacheError::Storage(format!("{} failed", op))
}

#[async_trait]
impl KeyedStore for FailingStore {
    async fn open_partition(&self, name: &str) -> CacheResult<Arc<dyn PartitionHandle>> {
        if self.flags.open.load(Ordering::SeqCst) {
            return Err(storage_error("open"));
        }
        let inner = self.inner.open_partition(name).await?;
        Ok(Arc::new(FailingPartition {
            inner,
            flags: self.flags.clone(),
        }))
    }

    async fn has_partition(&self, name: &str) -> CacheResult<bool> {
        self.inner.has_partition(name).await
    }

    async fn list_partition_names(&self) -> CacheResult<Vec<String>> {
        if self.flags.list.load(Ordering::SeqCst) {
            return Err(storage_error("list"));
        }
        self.inner.list_partition_names().await
    }

    async fn delete_partition(&self, name: &str) -> CacheResult<bool> {
        if self.flags.delete.lock().unwrap().contains(name) {
            return Err(storage_error("delete"));
        }
        self.inner.delete_partition(name).await
    }
}

struct FailingPartition {
    inner: Arc<dyn PartitionHandle>,
    flags: Arc<FailFlags>,
}

#[async_trait]
impl PartitionHandle for FailingPartition {
    async fn get(&self, identity: &RequestIdentity) -> CacheResult<Option<CacheEntry>> {
        if self.flags.get.load(Ordering::SeqCst) {
            return Err(storage_error("get"));
        }
        self.inner.get(identity).await
    }

    async fn put(&self, identity: RequestIdentity, response: ResponseSnapshot) -> CacheResult<()> {
        if self.flags.put.load(Ordering::SeqCst) {
            return Err(storage_error("put"));
        }
        self.inner.put(identity, response).await
    }

    async fn identities(&self) -> CacheResult<Vec<RequestIdentity>> {
        self.inner.identities().await
    }
}

/// A worker with its fakes.
pub struct Harness {
    pub fetch: Arc<ScriptedFetch>,
    pub store: Arc<dyn KeyedStore>,
    pub clients: Arc<LocalClients>,
    pub worker: Arc<ServiceWorker>,
}

/// Config with a small precache manifest.
pub fn config(version: &str) -> WorkerConfig {
    WorkerConfig::new(version).with_precache(vec!["/", "/index.html", "/static/js/bundle.js"])
}

/// Build a worker over `store`.
pub fn harness_with(config: WorkerConfig, store: Arc<dyn KeyedStore>, fetch: Arc<ScriptedFetch>) -> Harness {
    init_tracing();
    let clients = Arc::new(LocalClients::new());
    let worker = ServiceWorker::builder(config, fetch.clone())
        .store(store.clone())
        .clients(clients.clone())
        .build()
        .unwrap();
    Harness {
        fetch,
        store,
        clients,
        worker: Arc::new(worker),
    }
}

/// Build a worker over a fresh memory store.
pub fn harness(config: WorkerConfig) -> Harness {
    harness_with(config, Arc::new(MemoryStore::new()), ScriptedFetch::new())
}

/// Build, install and activate a worker.
pub async fn active_harness(config: WorkerConfig) -> Harness {
    let h = harness(config);
    h.worker.on_install().await.unwrap();
    h.worker.on_activate().await.unwrap();
    h
}

/// Cached body for `url` in `partition`, if any.
pub async fn cached_body(store: &dyn KeyedStore, partition: &str, url: &str) -> Option<String> {
    let handle = store.open_partition(partition).await.unwrap();
    handle
        .get(&RequestIdentity::get(url))
        .await
        .unwrap()
        .map(|entry| entry.response.text())
}
