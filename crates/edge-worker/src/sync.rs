//! Deferred work triggered by background sync events.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clients::{ClientFilter, ClientRegistry};
use crate::messages::WorkerMessage;

/// Error returned by deferred work.
pub type WorkError = Box<dyn std::error::Error + Send + Sync>;

/// The work performed when the recognised sync tag fires.
///
/// Must be idempotent: the platform may deliver the same trigger again.
#[async_trait]
pub trait DeferredWork: Send + Sync {
    async fn run(&self) -> Result<(), WorkError>;
}

/// Deferred work that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWork;

#[async_trait]
impl DeferredWork for NoopWork {
    async fn run(&self) -> Result<(), WorkError> {
        Ok(())
    }
}

/// A sync trigger delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub tag: String,
    pub enqueued_at: DateTime<Utc>,
    /// Delivery attempts so far, counted by the platform.
    pub attempts: u32,
}

impl SyncTask {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// What a sync trigger led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The tag is not the one this worker handles.
    Ignored,
    /// Work finished and `notified` clients received `SYNC_COMPLETED`.
    Completed { notified: usize, timestamp: i64 },
    /// Work failed; nothing was broadcast.
    Failed(String),
}

/// Runs deferred work for the recognised sync tag and announces completion.
pub struct SyncQueue {
    tag: String,
    work: Arc<dyn DeferredWork>,
    clients: Arc<dyn ClientRegistry>,
    last_timestamp: AtomicI64,
}

impl SyncQueue {
    pub fn new(
        tag: impl Into<String>,
        work: Arc<dyn DeferredWork>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            tag: tag.into(),
            work,
            clients,
            last_timestamp: AtomicI64::new(0),
        }
    }

    /// The tag this queue reacts to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Handle a sync trigger.
    pub async fn on_sync(&self, task: &SyncTask) -> SyncOutcome {
        if task.tag != self.tag {
            tracing::debug!(tag = %task.tag, "ignoring unknown sync tag");
            return SyncOutcome::Ignored;
        }

        tracing::debug!(tag = %task.tag, attempts = task.attempts, "running deferred work");

        if let Err(e) = self.work.run().await {
            tracing::error!(tag = %task.tag, attempts = task.attempts, error = %e, "background sync failed");
            return SyncOutcome::Failed(e.to_string());
        }

        let timestamp = self.next_timestamp();
        let clients = self.clients.match_all(ClientFilter::all()).await;
        let mut notified = 0;

        for client in &clients {
            match client
                .post_message(WorkerMessage::SyncCompleted { timestamp })
                .await
            {
                Ok(()) => notified += 1,
                Err(e) => {
                    tracing::warn!(client = %client.id(), error = %e, "failed to notify client");
                }
            }
        }

        tracing::info!(tag = %task.tag, notified, "background sync completed");
        SyncOutcome::Completed {
            notified,
            timestamp,
        }
    }

    /// Milliseconds since the epoch, never lower than a previous broadcast.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::clients::{ClientType, LocalClients};

    #[derive(Default)]
    struct CountingWork {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DeferredWork for CountingWork {
        async fn run(&self) -> Result<(), WorkError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("upstream rejected outbox".into());
            }
            Ok(())
        }
    }

    fn queue(work: Arc<CountingWork>) -> (Arc<LocalClients>, SyncQueue) {
        let clients = Arc::new(LocalClients::new());
        (clients.clone(), SyncQueue::new("background-sync", work, clients))
    }

    #[tokio::test]
    async fn test_unknown_tag_ignored() {
        let work = Arc::new(CountingWork::default());
        let (_, queue) = queue(work.clone());

        let outcome = queue.on_sync(&SyncTask::new("other")).await;
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(work.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completion_broadcast_to_all_clients() {
        let work = Arc::new(CountingWork::default());
        let (clients, queue) = queue(work);
        let tab = clients.connect(ClientType::Window, "/");
        let other = clients.connect(ClientType::Window, "/cart");

        let outcome = queue.on_sync(&SyncTask::new("background-sync")).await;
        let SyncOutcome::Completed { notified, timestamp } = outcome else {
            panic!("expected completion, got {:?}", outcome);
        };

        assert_eq!(notified, 2);
        for client in [tab, other] {
            assert_eq!(
                client.messages(),
                vec![WorkerMessage::SyncCompleted { timestamp }]
            );
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_broadcast() {
        let work = Arc::new(CountingWork {
            fail: true,
            ..Default::default()
        });
        let (clients, queue) = queue(work);
        let tab = clients.connect(ClientType::Window, "/");

        let outcome = queue.on_sync(&SyncTask::new("background-sync").with_attempts(2)).await;
        assert!(matches!(outcome, SyncOutcome::Failed(ref msg) if msg.contains("outbox")));
        assert!(tab.messages().is_empty());
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing() {
        let work = Arc::new(CountingWork::default());
        let (clients, queue) = queue(work);
        let tab = clients.connect(ClientType::Window, "/");

        for _ in 0..5 {
            queue.on_sync(&SyncTask::new("background-sync")).await;
        }

        let stamps: Vec<i64> = tab
            .messages()
            .into_iter()
            .map(|message| match message {
                WorkerMessage::SyncCompleted { timestamp } => timestamp,
                other => panic!("unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(stamps.len(), 5);
        assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_timestamp_never_goes_backwards() {
        let queue = SyncQueue::new("t", Arc::new(NoopWork), Arc::new(LocalClients::new()));
        queue.last_timestamp.store(i64::MAX - 1, Ordering::SeqCst);
        assert_eq!(queue.next_timestamp(), i64::MAX - 1);
    }
}
