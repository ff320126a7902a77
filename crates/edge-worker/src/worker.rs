//! The worker: every component wired behind the `Dispatcher` interface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_cache::{
    KeyedStore, MemoryStore, PartitionManager, PartitionSet, RequestClassifier, Served,
    StrategyEngine,
};
use edge_core::{FetchRequest, Url, WorkerConfig, WorkerState};
use edge_data::{FetchError, NetworkFetch};
use edge_observability::WorkerMetrics;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::clients::{ClientRegistry, LocalClients};
use crate::controller::{ActivateOutcome, InstallOutcome, LifecycleController};
use crate::dispatcher::Dispatcher;
use crate::error::WorkerError;
use crate::messages::{ControlMessage, ControlReceiver, WorkerMessage};
use crate::notify::{
    ClickRoute, NotificationClick, NotificationDispatcher, NotificationRequest,
    NotificationSurface, NotificationTray,
};
use crate::sweep::SweepTask;
use crate::sync::{DeferredWork, NoopWork, SyncOutcome, SyncQueue, SyncTask};

/// Builder for [`ServiceWorker`].
pub struct WorkerBuilder {
    config: WorkerConfig,
    fetch: Arc<dyn NetworkFetch>,
    store: Option<Arc<dyn KeyedStore>>,
    clients: Option<Arc<dyn ClientRegistry>>,
    surface: Option<Arc<dyn NotificationSurface>>,
    work: Option<Arc<dyn DeferredWork>>,
    metrics: Option<Arc<WorkerMetrics>>,
}

impl WorkerBuilder {
    /// Set the storage backend. Defaults to [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn KeyedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the client registry. Defaults to [`LocalClients`].
    pub fn clients(mut self, clients: Arc<dyn ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Set the notification surface. Defaults to [`NotificationTray`].
    pub fn notifications(mut self, surface: Arc<dyn NotificationSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Set the deferred sync work. Defaults to [`NoopWork`].
    pub fn deferred_work(mut self, work: Arc<dyn DeferredWork>) -> Self {
        self.work = Some(work);
        self
    }

    /// Share counters with the host.
    pub fn metrics(mut self, metrics: Arc<WorkerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and assemble the worker.
    pub fn build(self) -> Result<ServiceWorker, WorkerError> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyedStore>);
        let clients = self
            .clients
            .unwrap_or_else(|| Arc::new(LocalClients::new()) as Arc<dyn ClientRegistry>);
        let surface = self
            .surface
            .unwrap_or_else(|| Arc::new(NotificationTray::new()) as Arc<dyn NotificationSurface>);
        let work = self
            .work
            .unwrap_or_else(|| Arc::new(NoopWork) as Arc<dyn DeferredWork>);
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(WorkerMetrics::new()));

        let manager = PartitionManager::new(store.clone());
        let engine = StrategyEngine::new(store, self.fetch.clone()).with_metrics(metrics.clone());
        let controller = LifecycleController::new(
            config.clone(),
            manager.clone(),
            self.fetch.clone(),
            clients.clone(),
        );
        let sync = SyncQueue::new(config.sync_tag.clone(), work, clients.clone());
        let notifications =
            NotificationDispatcher::new(config.notifications.clone(), surface, clients);

        Ok(ServiceWorker {
            classifier: RequestClassifier::from_config(&config),
            origin: config.origin_url(),
            partitions: PartitionSet::from_config(&config),
            config,
            fetch: self.fetch,
            manager,
            engine,
            controller,
            sync,
            notifications,
            metrics,
            sweep: Mutex::new(None),
        })
    }
}

/// One deployed version of the offline worker.
pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    origin: Option<Url>,
    classifier: RequestClassifier,
    partitions: PartitionSet,
    fetch: Arc<dyn NetworkFetch>,
    manager: PartitionManager,
    engine: StrategyEngine,
    controller: LifecycleController,
    sync: SyncQueue,
    notifications: NotificationDispatcher,
    metrics: Arc<WorkerMetrics>,
    sweep: Mutex<Option<SweepTask>>,
}

impl ServiceWorker {
    /// Start building a worker for `config` that fetches through `fetch`.
    pub fn builder(config: WorkerConfig, fetch: Arc<dyn NetworkFetch>) -> WorkerBuilder {
        WorkerBuilder {
            config,
            fetch,
            store: None,
            clients: None,
            surface: None,
            work: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn state(&self) -> WorkerState {
        self.controller.state()
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Start the periodic orphan sweep.
    ///
    /// Only the active version sweeps: a waiting version would delete the
    /// partitions the active one is still serving from.
    pub async fn start_sweep(&self) -> Result<(), WorkerError> {
        if self.state() != WorkerState::Active {
            return Err(WorkerError::NotActive);
        }

        let mut slot = self.sweep.lock().await;
        if slot.as_ref().map_or(false, SweepTask::is_running) {
            return Ok(());
        }

        *slot = Some(SweepTask::spawn(
            self.manager.clone(),
            self.partitions.whitelist(),
            Duration::from_secs(self.config.sweep_interval_secs),
            self.metrics.clone(),
        ));
        Ok(())
    }

    /// Whether the sweep loop is running.
    pub async fn is_sweeping(&self) -> bool {
        self.sweep
            .lock()
            .await
            .as_ref()
            .map_or(false, SweepTask::is_running)
    }

    /// Stop background tasks owned by the worker.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweep.lock().await.take() {
            task.stop().await;
        }
        tracing::info!(version = %self.config.version, "worker shut down");
    }

    /// Drain a control channel until every sender is dropped.
    pub fn serve_control(self: &Arc<Self>, mut receiver: ControlReceiver) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                match worker.on_message(envelope.message).await {
                    Ok(Some(reply)) => {
                        if let Some(tx) = envelope.reply {
                            let _ = tx.send(reply);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(msg = ?envelope.message, error = %e, "control message failed");
                    }
                }
            }
        })
    }

    async fn passthrough(&self, request: &FetchRequest) -> Result<Served, FetchError> {
        self.metrics.record_bypass();
        let response = self.fetch.fetch(request).await?;
        Ok(Served::bypass(response))
    }
}

#[async_trait]
impl Dispatcher for ServiceWorker {
    async fn on_install(&self) -> Result<InstallOutcome, WorkerError> {
        self.controller.on_install().await
    }

    async fn on_activate(&self) -> Result<ActivateOutcome, WorkerError> {
        let outcome = self.controller.on_activate().await?;
        self.metrics.record_purged(outcome.purged.len());
        Ok(outcome)
    }

    async fn on_fetch(&self, request: FetchRequest) -> Result<Served, FetchError> {
        if !request.is_get() {
            return self.passthrough(&request).await;
        }
        if !self.state().is_serving() {
            tracing::debug!(url = %request.url, state = %self.state(), "not serving yet");
            return self.passthrough(&request).await;
        }

        let request = match &self.origin {
            Some(origin) => request.scoped_to(origin),
            None => request,
        };
        let class = self.classifier.classify(&request);
        let partition = self.partitions.for_class(class);
        let served = self.engine.serve(&request, class, partition).await;

        if self.config.explain_headers {
            Ok(served.with_explain_headers())
        } else {
            Ok(served)
        }
    }

    async fn on_message(&self, message: ControlMessage) -> Result<Option<WorkerMessage>, WorkerError> {
        match message {
            ControlMessage::SkipWaiting => {
                if let Some(outcome) = self.controller.skip_waiting().await? {
                    self.metrics.record_purged(outcome.purged.len());
                }
                Ok(None)
            }
            ControlMessage::GetCacheInfo => Ok(Some(WorkerMessage::CacheInfo(self.partitions.clone()))),
        }
    }

    async fn on_sync(&self, task: SyncTask) -> SyncOutcome {
        let outcome = self.sync.on_sync(&task).await;
        match &outcome {
            SyncOutcome::Completed { .. } => self.metrics.record_sync_completed(),
            SyncOutcome::Failed(_) => self.metrics.record_sync_failed(),
            SyncOutcome::Ignored => {}
        }
        outcome
    }

    async fn on_push(&self, payload: Option<String>) -> Result<NotificationRequest, WorkerError> {
        let request = self
            .notifications
            .show_notification(payload.as_deref())
            .await?;
        self.metrics.record_notification();
        Ok(request)
    }

    async fn on_notification_click(&self, click: NotificationClick) -> Result<ClickRoute, WorkerError> {
        self.notifications.on_notification_click(&click).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use edge_core::{Method, ResponseSnapshot};

    use super::*;
    use crate::messages::control_channel;

    struct Echo;

    #[async_trait]
    impl NetworkFetch for Echo {
        async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
            Ok(ResponseSnapshot::ok(format!("{} {}", request.method, request.url)))
        }
    }

    fn worker(config: WorkerConfig) -> ServiceWorker {
        ServiceWorker::builder(config.with_precache(vec!["/"]), Arc::new(Echo))
            .build()
            .unwrap()
    }

    async fn active(config: WorkerConfig) -> ServiceWorker {
        let worker = worker(config);
        worker.on_install().await.unwrap();
        worker.on_activate().await.unwrap();
        worker
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ServiceWorker::builder(WorkerConfig::new(""), Arc::new(Echo)).build();
        assert!(matches!(result, Err(WorkerError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_before_activation_bypasses() {
        let worker = worker(WorkerConfig::new("1"));
        let served = worker.on_fetch(FetchRequest::get("/products")).await.unwrap();
        assert_eq!(served.status, edge_cache::CacheStatus::Bypass);
    }

    #[tokio::test]
    async fn test_post_passthrough() {
        let worker = active(WorkerConfig::new("1")).await;
        let served = worker
            .on_fetch(FetchRequest::new(Method::POST, "/api/orders"))
            .await
            .unwrap();

        assert_eq!(served.status, edge_cache::CacheStatus::Bypass);
        assert_eq!(served.response.text(), "POST /api/orders");
        assert_eq!(worker.metrics().snapshot().bypassed, 1);
    }

    #[tokio::test]
    async fn test_precached_root_is_hit() {
        let worker = active(WorkerConfig::new("1")).await;
        let served = worker.on_fetch(FetchRequest::get("/")).await.unwrap();
        assert_eq!(served.status, edge_cache::CacheStatus::Hit);
        assert_eq!(served.partition.as_deref(), Some("static-v1"));
    }

    #[tokio::test]
    async fn test_explain_headers_when_enabled() {
        let worker = active(WorkerConfig::new("1").with_explain_headers(true)).await;
        let served = worker.on_fetch(FetchRequest::get("/api/products")).await.unwrap();
        assert_eq!(served.response.header("X-Resource-Class"), Some("api"));
    }

    #[tokio::test]
    async fn test_get_cache_info() {
        let worker = worker(WorkerConfig::new("7"));
        let reply = worker.on_message(ControlMessage::GetCacheInfo).await.unwrap();
        let Some(WorkerMessage::CacheInfo(info)) = reply else {
            panic!("expected cache info, got {:?}", reply);
        };
        assert_eq!(info.static_partition, "static-v7");
    }

    #[tokio::test]
    async fn test_skip_waiting_activates() {
        let worker = worker(WorkerConfig::new("1"));
        worker.on_install().await.unwrap();

        let reply = worker.on_message(ControlMessage::SkipWaiting).await.unwrap();
        assert!(reply.is_none());
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_control_channel_round_trip() {
        let worker = Arc::new(worker(WorkerConfig::new("2")));
        let (sender, receiver) = control_channel(8);
        let handle = worker.serve_control(receiver);

        let reply = sender.request(ControlMessage::GetCacheInfo).await.unwrap();
        assert!(matches!(reply, Some(WorkerMessage::CacheInfo(_))));

        drop(sender);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_requires_active() {
        let worker = worker(WorkerConfig::new("1"));
        assert!(matches!(worker.start_sweep().await, Err(WorkerError::NotActive)));

        worker.on_install().await.unwrap();
        worker.on_activate().await.unwrap();
        worker.start_sweep().await.unwrap();
        assert!(worker.is_sweeping().await);

        worker.shutdown().await;
        assert!(!worker.is_sweeping().await);
    }
}
