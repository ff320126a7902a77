//! Install, activate and version cutover.

use std::sync::Arc;

use edge_cache::{PartitionManager, PartitionSet};
use edge_core::{WorkerConfig, WorkerState};
use edge_data::NetworkFetch;
use tokio::sync::watch;

use crate::clients::ClientRegistry;
use crate::error::WorkerError;

/// Result of a successful install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Take over without waiting for the previous version's clients to close.
    pub skip_waiting: bool,
    /// Number of manifest entries stored in the static partition.
    pub precached: usize,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Partitions deleted because they were not in the whitelist.
    pub purged: Vec<String>,
}

/// Drives one worker version through its lifecycle.
///
/// A new deployment gets a new controller; the old controller's `Active`
/// state is superseded, never transitioned.
pub struct LifecycleController {
    config: Arc<WorkerConfig>,
    partitions: PartitionSet,
    manager: PartitionManager,
    fetch: Arc<dyn NetworkFetch>,
    clients: Arc<dyn ClientRegistry>,
    state: watch::Sender<WorkerState>,
}

impl LifecycleController {
    pub fn new(
        config: Arc<WorkerConfig>,
        manager: PartitionManager,
        fetch: Arc<dyn NetworkFetch>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        let partitions = PartitionSet::from_config(&config);
        let (state, _) = watch::channel(WorkerState::Installing);
        Self {
            config,
            partitions,
            manager,
            fetch,
            clients,
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    /// Create the partitions and pre-populate the static one.
    ///
    /// Any failure is fatal: the controller becomes `Redundant` and can never
    /// be activated.
    pub async fn on_install(&self) -> Result<InstallOutcome, WorkerError> {
        if self.state() != WorkerState::Installing {
            return Err(WorkerError::InvalidTransition {
                from: self.state(),
                to: WorkerState::Installed,
            });
        }

        tracing::info!(version = %self.config.version, "installing");

        match self.prepare().await {
            Ok(precached) => {
                self.transition(WorkerState::Installed)?;
                tracing::info!(version = %self.config.version, precached, "installed");
                Ok(InstallOutcome {
                    skip_waiting: true,
                    precached,
                })
            }
            Err(e) => {
                tracing::error!(version = %self.config.version, error = %e, "install failed");
                self.transition(WorkerState::Redundant)?;
                Err(WorkerError::Install(e))
            }
        }
    }

    async fn prepare(&self) -> Result<usize, edge_cache::CacheError> {
        self.manager
            .ensure_partitions(&self.partitions.names())
            .await?;

        let precache = self.config.scoped_precache();
        if precache.is_empty() {
            return Ok(0);
        }

        self.manager
            .populate(
                &self.partitions.static_partition,
                &precache,
                self.fetch.as_ref(),
            )
            .await
    }

    /// Delete every partition outside the whitelist and claim all clients.
    pub async fn on_activate(&self) -> Result<ActivateOutcome, WorkerError> {
        self.transition(WorkerState::Activating)?;
        tracing::info!(version = %self.config.version, "activating");

        let purged = self
            .manager
            .purge_except(&self.partitions.whitelist())
            .await;

        if let Err(e) = self.clients.claim().await {
            tracing::warn!(error = %e, "failed to claim clients");
        }

        self.transition(WorkerState::Active)?;
        tracing::info!(
            version = %self.config.version,
            purged = purged.len(),
            "active"
        );

        Ok(ActivateOutcome { purged })
    }

    /// Activate now if installed and waiting. Otherwise does nothing.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateOutcome>, WorkerError> {
        if self.state() != WorkerState::Installed {
            tracing::debug!(state = %self.state(), "skip waiting ignored");
            return Ok(None);
        }
        self.on_activate().await.map(Some)
    }

    fn transition(&self, to: WorkerState) -> Result<(), WorkerError> {
        let mut result = Ok(());
        self.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                *current = to;
                true
            } else {
                result = Err(WorkerError::InvalidTransition { from: *current, to });
                false
            }
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use edge_cache::{KeyedStore, MemoryStore, RequestIdentity};
    use edge_core::{FetchRequest, ResponseSnapshot};
    use edge_data::FetchError;

    use super::*;
    use crate::clients::{ClientType, LocalClients};

    struct Origin {
        missing: Option<&'static str>,
    }

    #[async_trait]
    impl NetworkFetch for Origin {
        async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
            if self.missing == Some(request.url.as_str()) {
                return Err(FetchError::Connection("unreachable".to_string()));
            }
            Ok(ResponseSnapshot::ok(request.url.clone()))
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clients: Arc<LocalClients>,
        controller: LifecycleController,
    }

    fn fixture(version: &str, missing: Option<&'static str>) -> Fixture {
        fixture_with_store(Arc::new(MemoryStore::new()), version, missing)
    }

    fn fixture_with_store(store: Arc<MemoryStore>, version: &str, missing: Option<&'static str>) -> Fixture {
        let clients = Arc::new(LocalClients::new());
        let config = WorkerConfig::new(version).with_precache(vec!["/", "/static/js/bundle.js"]);
        let controller = LifecycleController::new(
            Arc::new(config),
            PartitionManager::new(store.clone()),
            Arc::new(Origin { missing }),
            clients.clone(),
        );
        Fixture {
            store,
            clients,
            controller,
        }
    }

    // === Install Tests ===

    #[tokio::test]
    async fn test_install_creates_and_precaches() {
        let f = fixture("1", None);

        let outcome = f.controller.on_install().await.unwrap();
        assert!(outcome.skip_waiting);
        assert_eq!(outcome.precached, 2);
        assert_eq!(f.controller.state(), WorkerState::Installed);

        assert_eq!(
            f.store.list_partition_names().await.unwrap(),
            vec!["dynamic-v1", "image-v1", "static-v1"]
        );
        let static_partition = f.store.open_partition("static-v1").await.unwrap();
        assert!(static_partition
            .get(&RequestIdentity::get("/static/js/bundle.js"))
            .await
            .unwrap()
            .is_some());
        let dynamic = f.store.open_partition("dynamic-v1").await.unwrap();
        assert!(dynamic.identities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_install_is_fatal() {
        let f = fixture("2", Some("/static/js/bundle.js"));

        let err = f.controller.on_install().await.unwrap_err();
        assert!(matches!(err, WorkerError::Install(_)));
        assert_eq!(f.controller.state(), WorkerState::Redundant);

        let err = f.controller.on_activate().await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTransition { .. }));
        assert_eq!(f.clients.claim_count(), 0);
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let f = fixture("1", None);
        f.controller.on_install().await.unwrap();
        assert!(f.controller.on_install().await.is_err());
    }

    // === Activate Tests ===

    #[tokio::test]
    async fn test_activate_purges_and_claims() {
        let store = Arc::new(MemoryStore::new());
        for name in ["static-v2", "dynamic-v2", "image-v2"] {
            store.open_partition(name).await.unwrap();
        }
        let f = fixture_with_store(store, "3", None);
        let tab = f.clients.connect(ClientType::Window, "/");

        f.controller.on_install().await.unwrap();
        let mut outcome = f.controller.on_activate().await.unwrap();
        outcome.purged.sort();

        assert_eq!(outcome.purged, vec!["dynamic-v2", "image-v2", "static-v2"]);
        assert_eq!(f.controller.state(), WorkerState::Active);
        assert!(tab.is_controlled());
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let f = fixture("1", None);
        assert!(f.controller.on_activate().await.is_err());
        assert_eq!(f.controller.state(), WorkerState::Installing);
    }

    #[tokio::test]
    async fn test_skip_waiting_only_when_installed() {
        let f = fixture("1", None);
        assert!(f.controller.skip_waiting().await.unwrap().is_none());

        f.controller.on_install().await.unwrap();
        assert!(f.controller.skip_waiting().await.unwrap().is_some());
        assert_eq!(f.controller.state(), WorkerState::Active);

        assert!(f.controller.skip_waiting().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let f = fixture("1", None);
        let mut rx = f.controller.subscribe();

        f.controller.on_install().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), WorkerState::Installed);
    }
}
