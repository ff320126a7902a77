//! Serving strategies.

use std::sync::Arc;

use edge_core::{FetchRequest, ResponseSnapshot};
use edge_data::NetworkFetch;
use edge_observability::WorkerMetrics;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::headers::CacheExplainHeaders;
use crate::key::{CacheEntry, RequestIdentity};
use crate::policy::{ResourceClass, Strategy};
use crate::store::KeyedStore;

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the partition without touching the network.
    Hit,
    /// Served from the network.
    Miss,
    /// Served from the partition while a refresh runs.
    Stale,
    /// Network failed, served from the partition.
    Fallback,
    /// Network failed and nothing was cached: the synthetic 503.
    Offline,
    /// Not handled by a cache strategy.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Stale => write!(f, "STALE"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::Offline => write!(f, "OFFLINE"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// Result of a background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// The fresh response replaced the cached entry.
    Updated,
    /// The network answered with a non-2xx status; the entry was kept.
    NotStored(u16),
    /// The network failed; the entry was kept.
    Failed,
}

/// A response together with how it was served.
#[derive(Debug)]
pub struct Served {
    pub response: ResponseSnapshot,
    pub status: CacheStatus,
    pub class: Option<ResourceClass>,
    pub partition: Option<String>,
    /// Background refresh started by stale-while-revalidate.
    ///
    /// Dropping the handle detaches the task; it is never cancelled.
    pub revalidation: Option<JoinHandle<RevalidationOutcome>>,
}

impl Served {
    /// A response that did not go through a cache strategy.
    pub fn bypass(response: ResponseSnapshot) -> Self {
        Self {
            response,
            status: CacheStatus::Bypass,
            class: None,
            partition: None,
            revalidation: None,
        }
    }

    fn new(response: ResponseSnapshot, status: CacheStatus, class: ResourceClass, partition: &str) -> Self {
        Self {
            response,
            status,
            class: Some(class),
            partition: Some(partition.to_string()),
            revalidation: None,
        }
    }

    /// Explain headers describing this outcome.
    pub fn explain(&self) -> CacheExplainHeaders {
        let mut headers = CacheExplainHeaders::new().with_status(self.status);
        if let Some(class) = self.class {
            headers = headers.with_class(class).with_strategy(class.strategy());
        }
        if let Some(partition) = &self.partition {
            headers = headers.with_partition(partition.clone());
        }
        headers
    }

    /// Attach explain headers to the response.
    pub fn with_explain_headers(mut self) -> Self {
        self.explain().apply(&mut self.response);
        self
    }
}

/// Executes the serving strategy for a classified request.
#[derive(Clone)]
pub struct StrategyEngine {
    store: Arc<dyn KeyedStore>,
    fetch: Arc<dyn NetworkFetch>,
    metrics: Arc<WorkerMetrics>,
}

impl StrategyEngine {
    /// Create an engine over a store and a network capability.
    pub fn new(store: Arc<dyn KeyedStore>, fetch: Arc<dyn NetworkFetch>) -> Self {
        Self {
            store,
            fetch,
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    /// Record outcomes into shared counters.
    pub fn with_metrics(mut self, metrics: Arc<WorkerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Serve a request from `partition` using the strategy for `class`.
    ///
    /// Always produces a response. Non-`GET` requests are passed to the
    /// network and never cached.
    pub async fn serve(&self, request: &FetchRequest, class: ResourceClass, partition: &str) -> Served {
        let Some(identity) = RequestIdentity::for_request(request) else {
            return self.passthrough(request).await;
        };

        let served = match class.strategy() {
            Strategy::CacheFirst => self.cache_first(request, identity, class, partition).await,
            Strategy::NetworkFirst => self.network_first(request, identity, class, partition).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, identity, class, partition)
                    .await
            }
        };

        tracing::debug!(
            url = %request.url,
            class = %class,
            partition = %partition,
            status = %served.status,
            "served"
        );
        self.record(served.status);
        served
    }

    async fn cache_first(
        &self,
        request: &FetchRequest,
        identity: RequestIdentity,
        class: ResourceClass,
        partition: &str,
    ) -> Served {
        if let Some(entry) = lookup(self.store.as_ref(), partition, &identity).await {
            return Served::new(entry.response, CacheStatus::Hit, class, partition);
        }

        match self.fetch.fetch(request).await {
            Ok(response) => {
                store(self.store.as_ref(), partition, identity, &response).await;
                Served::new(response, CacheStatus::Miss, class, partition)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed with nothing cached");
                Served::new(ResponseSnapshot::offline(), CacheStatus::Offline, class, partition)
            }
        }
    }

    async fn network_first(
        &self,
        request: &FetchRequest,
        identity: RequestIdentity,
        class: ResourceClass,
        partition: &str,
    ) -> Served {
        match self.fetch.fetch(request).await {
            Ok(response) => {
                store(self.store.as_ref(), partition, identity, &response).await;
                Served::new(response, CacheStatus::Miss, class, partition)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed, trying cache");
                match lookup(self.store.as_ref(), partition, &identity).await {
                    Some(entry) => Served::new(entry.response, CacheStatus::Fallback, class, partition),
                    None => Served::new(ResponseSnapshot::offline(), CacheStatus::Offline, class, partition),
                }
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &FetchRequest,
        identity: RequestIdentity,
        class: ResourceClass,
        partition: &str,
    ) -> Served {
        let Some(entry) = lookup(self.store.as_ref(), partition, &identity).await else {
            return self.network_first(request, identity, class, partition).await;
        };

        let store_ref = self.store.clone();
        let fetch = self.fetch.clone();
        let metrics = self.metrics.clone();
        let request = request.clone();
        let partition_name = partition.to_string();

        let revalidation = tokio::spawn(async move {
            match fetch.fetch(&request).await {
                Ok(response) => {
                    let status = response.status;
                    if store(store_ref.as_ref(), &partition_name, identity, &response).await {
                        RevalidationOutcome::Updated
                    } else {
                        RevalidationOutcome::NotStored(status)
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "background revalidation failed");
                    metrics.record_revalidation_failure();
                    RevalidationOutcome::Failed
                }
            }
        });

        let mut served = Served::new(entry.response, CacheStatus::Stale, class, partition);
        served.revalidation = Some(revalidation);
        served
    }

    async fn passthrough(&self, request: &FetchRequest) -> Served {
        self.metrics.record_bypass();
        match self.fetch.fetch(request).await {
            Ok(response) => Served::bypass(response),
            Err(e) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %e, "passthrough failed");
                let mut served = Served::bypass(ResponseSnapshot::offline());
                served.status = CacheStatus::Offline;
                served
            }
        }
    }

    fn record(&self, status: CacheStatus) {
        match status {
            CacheStatus::Hit => self.metrics.record_hit(),
            CacheStatus::Miss => self.metrics.record_miss(),
            CacheStatus::Stale => self.metrics.record_stale(),
            CacheStatus::Fallback => self.metrics.record_fallback(),
            CacheStatus::Offline => self.metrics.record_offline(),
            CacheStatus::Bypass => self.metrics.record_bypass(),
        }
    }
}

/// Look up an entry, treating store failures as a miss.
async fn lookup(
    store: &dyn KeyedStore,
    partition: &str,
    identity: &RequestIdentity,
) -> Option<CacheEntry> {
    let handle = match store.open_partition(partition).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(partition = %partition, error = %e, "cache read failed");
            return None;
        }
    };

    match handle.get(identity).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!(partition = %partition, key = %identity, error = %e, "cache read failed");
            None
        }
    }
}

/// Store a successful response. Returns whether it was written.
async fn store(
    store: &dyn KeyedStore,
    partition: &str,
    identity: RequestIdentity,
    response: &ResponseSnapshot,
) -> bool {
    if !response.is_success() {
        return false;
    }

    let handle = match store.open_partition(partition).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(partition = %partition, error = %e, "cache write failed");
            return false;
        }
    };

    match handle.put(identity, response.clone()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(partition = %partition, error = %e, "cache write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use edge_core::Method;
    use edge_data::FetchError;

    use super::*;
    use crate::store::MemoryStore;

    /// Answers with `body-{n}` where n counts calls; fails while `offline`.
    #[derive(Default)]
    struct CountingFetch {
        calls: AtomicUsize,
        offline: Mutex<bool>,
        status: Mutex<u16>,
    }

    impl CountingFetch {
        fn online() -> Arc<Self> {
            let fetch = Self::default();
            *fetch.status.lock().unwrap() = 200;
            Arc::new(fetch)
        }

        fn set_offline(&self, offline: bool) {
            *self.offline.lock().unwrap() = offline;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NetworkFetch for CountingFetch {
        async fn fetch(&self, _request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if *self.offline.lock().unwrap() {
                return Err(FetchError::Connection("offline".to_string()));
            }
            let status = *self.status.lock().unwrap();
            Ok(ResponseSnapshot::new(status, Default::default(), format!("body-{}", n).into_bytes()))
        }
    }

    fn engine(fetch: Arc<CountingFetch>) -> (Arc<MemoryStore>, StrategyEngine) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), StrategyEngine::new(store, fetch))
    }

    async fn cached_text(store: &MemoryStore, partition: &str, url: &str) -> Option<String> {
        let handle = store.open_partition(partition).await.unwrap();
        handle
            .get(&RequestIdentity::get(url))
            .await
            .unwrap()
            .map(|entry| entry.response.text())
    }

    // === Cache-First Tests ===

    #[tokio::test]
    async fn test_cache_first_fetches_once() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/static/js/main.js");

        let first = engine.serve(&request, ResourceClass::Static, "static-v1").await;
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(fetch.calls(), 1);
        assert_eq!(cached_text(&store, "static-v1", "/static/js/main.js").await.as_deref(), Some("body-1"));

        for _ in 0..3 {
            let again = engine.serve(&request, ResourceClass::Static, "static-v1").await;
            assert_eq!(again.status, CacheStatus::Hit);
            assert_eq!(again.response.text(), "body-1");
        }
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_offline_returns_503() {
        let fetch = CountingFetch::online();
        fetch.set_offline(true);
        let (_, engine) = engine(fetch);

        let served = engine
            .serve(&FetchRequest::get("/a.png"), ResourceClass::Image, "image-v1")
            .await;
        assert_eq!(served.status, CacheStatus::Offline);
        assert!(served.response.is_offline());
        assert_eq!(served.response.status, 503);
    }

    #[tokio::test]
    async fn test_error_status_not_stored() {
        let fetch = CountingFetch::online();
        *fetch.status.lock().unwrap() = 404;
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/missing.png");

        let served = engine.serve(&request, ResourceClass::Image, "image-v1").await;
        assert_eq!(served.response.status, 404);
        assert!(cached_text(&store, "image-v1", "/missing.png").await.is_none());

        engine.serve(&request, ResourceClass::Image, "image-v1").await;
        assert_eq!(fetch.calls(), 2);
    }

    // === Network-First Tests ===

    #[tokio::test]
    async fn test_network_first_overwrites_entry() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/api/products");

        engine.serve(&request, ResourceClass::Api, "dynamic-v1").await;
        let second = engine.serve(&request, ResourceClass::Api, "dynamic-v1").await;

        assert_eq!(second.status, CacheStatus::Miss);
        assert_eq!(second.response.text(), "body-2");
        assert_eq!(cached_text(&store, "dynamic-v1", "/api/products").await.as_deref(), Some("body-2"));
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let fetch = CountingFetch::online();
        let (_, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/api/products");

        engine.serve(&request, ResourceClass::Api, "dynamic-v1").await;
        fetch.set_offline(true);

        let served = engine.serve(&request, ResourceClass::Api, "dynamic-v1").await;
        assert_eq!(served.status, CacheStatus::Fallback);
        assert_eq!(served.response.text(), "body-1");
    }

    #[tokio::test]
    async fn test_network_first_offline_without_cache() {
        let fetch = CountingFetch::online();
        fetch.set_offline(true);
        let (_, engine) = engine(fetch);

        let served = engine
            .serve(&FetchRequest::get("/api/cart"), ResourceClass::Api, "dynamic-v1")
            .await;
        assert_eq!(served.status, CacheStatus::Offline);
        assert_eq!(served.response.status, 503);
    }

    // === Stale-While-Revalidate Tests ===

    #[tokio::test]
    async fn test_swr_cold_cache_awaits_network() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());

        let served = engine
            .serve(&FetchRequest::get("/products/1"), ResourceClass::Dynamic, "dynamic-v1")
            .await;
        assert_eq!(served.status, CacheStatus::Miss);
        assert!(served.revalidation.is_none());
        assert_eq!(cached_text(&store, "dynamic-v1", "/products/1").await.as_deref(), Some("body-1"));
    }

    #[tokio::test]
    async fn test_swr_serves_cached_and_refreshes() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/products/1");

        engine.serve(&request, ResourceClass::Dynamic, "dynamic-v1").await;

        let served = engine.serve(&request, ResourceClass::Dynamic, "dynamic-v1").await;
        assert_eq!(served.status, CacheStatus::Stale);
        assert_eq!(served.response.text(), "body-1");

        let outcome = served.revalidation.unwrap().await.unwrap();
        assert_eq!(outcome, RevalidationOutcome::Updated);
        assert_eq!(fetch.calls(), 2);
        assert_eq!(cached_text(&store, "dynamic-v1", "/products/1").await.as_deref(), Some("body-2"));
    }

    #[tokio::test]
    async fn test_swr_refresh_failure_is_swallowed() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::get("/products/1");

        engine.serve(&request, ResourceClass::Dynamic, "dynamic-v1").await;
        fetch.set_offline(true);

        let served = engine.serve(&request, ResourceClass::Dynamic, "dynamic-v1").await;
        assert_eq!(served.response.text(), "body-1");

        let outcome = served.revalidation.unwrap().await.unwrap();
        assert_eq!(outcome, RevalidationOutcome::Failed);
        assert_eq!(fetch.calls(), 2);
        assert_eq!(cached_text(&store, "dynamic-v1", "/products/1").await.as_deref(), Some("body-1"));
        assert_eq!(engine.metrics().snapshot().revalidation_failures, 1);
    }

    // === Passthrough Tests ===

    #[tokio::test]
    async fn test_writes_are_never_cached() {
        let fetch = CountingFetch::online();
        let (store, engine) = engine(fetch.clone());
        let request = FetchRequest::new(Method::POST, "/api/cart").with_body("{}");

        let served = engine.serve(&request, ResourceClass::Api, "dynamic-v1").await;
        assert_eq!(served.status, CacheStatus::Bypass);
        assert!(served.partition.is_none());
        assert!(store.list_partition_names().await.unwrap().is_empty());
    }

    // === Metrics Tests ===

    #[tokio::test]
    async fn test_outcomes_recorded() {
        let fetch = CountingFetch::online();
        let metrics = Arc::new(WorkerMetrics::new());
        let store = Arc::new(MemoryStore::new());
        let engine = StrategyEngine::new(store, fetch).with_metrics(metrics.clone());
        let request = FetchRequest::get("/static/app.js");

        engine.serve(&request, ResourceClass::Static, "static-v1").await;
        engine.serve(&request, ResourceClass::Static, "static-v1").await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hits, 1);
    }

    #[tokio::test]
    async fn test_explain_headers_attached() {
        let fetch = CountingFetch::online();
        let (_, engine) = engine(fetch);

        let served = engine
            .serve(&FetchRequest::get("/api/x"), ResourceClass::Api, "dynamic-v1")
            .await
            .with_explain_headers();

        assert_eq!(served.response.header("X-Cache-Status"), Some("MISS"));
        assert_eq!(served.response.header("X-Cache-Strategy"), Some("network-first"));
        assert_eq!(served.response.header("X-Cache-Partition"), Some("dynamic-v1"));
        assert_eq!(served.response.header("X-Resource-Class"), Some("api"));
    }
}
