//! Periodic orphan sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use edge_cache::PartitionManager;
use edge_observability::WorkerMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A running sweep loop.
///
/// Deletes partitions outside the whitelist once per period until stopped.
/// Dropping the task aborts the loop.
pub struct SweepTask {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SweepTask {
    /// Start sweeping. The first sweep runs one `period` after spawning.
    pub fn spawn(
        manager: PartitionManager,
        whitelist: HashSet<String>,
        period: Duration,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(period_secs = period.as_secs(), "sweep started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let deleted = manager.sweep_orphans(&whitelist).await;
                        metrics.record_purged(deleted.len());
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("sweep stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "sweep task ended abnormally");
            }
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
