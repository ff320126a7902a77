//! Worker counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free counters shared by every task the worker spawns.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    fallbacks: AtomicU64,
    offline: AtomicU64,
    bypassed: AtomicU64,
    revalidation_failures: AtomicU64,
    partitions_purged: AtomicU64,
    sync_completed: AtomicU64,
    sync_failed: AtomicU64,
    notifications_shown: AtomicU64,
}

impl WorkerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Served straight from a partition.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Served from the network after a miss or a fresh fetch.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Served a cached entry while a refresh runs in the background.
    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Network failed and a cached entry was served instead.
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// The synthetic offline response was served.
    pub fn record_offline(&self) {
        self.offline.fetch_add(1, Ordering::Relaxed);
    }

    /// A request went straight to the network.
    pub fn record_bypass(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revalidation_failure(&self) {
        self.revalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self, count: usize) {
        self.partitions_purged
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sync_completed(&self) {
        self.sync_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_failed(&self) {
        self.sync_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_shown.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            offline: self.offline.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            revalidation_failures: self.revalidation_failures.load(Ordering::Relaxed),
            partitions_purged: self.partitions_purged.load(Ordering::Relaxed),
            sync_completed: self.sync_completed.load(Ordering::Relaxed),
            sync_failed: self.sync_failed.load(Ordering::Relaxed),
            notifications_shown: self.notifications_shown.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub fallbacks: u64,
    pub offline: u64,
    pub bypassed: u64,
    pub revalidation_failures: u64,
    pub partitions_purged: u64,
    pub sync_completed: u64,
    pub sync_failed: u64,
    pub notifications_shown: u64,
}

impl MetricsSnapshot {
    /// Requests answered by a cache strategy.
    pub fn served(&self) -> u64 {
        self.hits + self.misses + self.stale + self.fallbacks + self.offline
    }

    /// Fraction of strategy-served requests answered from a partition.
    pub fn hit_ratio(&self) -> f64 {
        let served = self.served();
        if served == 0 {
            return 0.0;
        }
        (self.hits + self.stale + self.fallbacks) as f64 / served as f64
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as JSON (pretty printed).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Requests: {} served, {} bypassed ({:.1}% from cache)",
            self.served(),
            self.bypassed,
            self.hit_ratio() * 100.0
        ));
        lines.push(format!(
            "  hit={} miss={} stale={} fallback={} offline={}",
            self.hits, self.misses, self.stale, self.fallbacks, self.offline
        ));

        if self.revalidation_failures > 0 {
            lines.push(format!(
                "  Revalidation failures: {}",
                self.revalidation_failures
            ));
        }

        if self.partitions_purged > 0 {
            lines.push(format!("  Partitions purged: {}", self.partitions_purged));
        }

        if self.sync_completed + self.sync_failed > 0 {
            lines.push(format!(
                "  Sync: {} completed, {} failed",
                self.sync_completed, self.sync_failed
            ));
        }

        if self.notifications_shown > 0 {
            lines.push(format!(
                "  Notifications shown: {}",
                self.notifications_shown
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = WorkerMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_purged(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.partitions_purged, 3);
        assert_eq!(snapshot.served(), 3);
    }

    #[test]
    fn test_hit_ratio_empty() {
        assert_eq!(MetricsSnapshot::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio_counts_cached_answers() {
        let snapshot = MetricsSnapshot {
            hits: 1,
            stale: 1,
            misses: 2,
            ..Default::default()
        };
        assert!((snapshot.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_omits_empty_sections() {
        let metrics = WorkerMetrics::new();
        metrics.record_hit();
        let summary = metrics.snapshot().to_summary();
        assert!(summary.contains("hit=1"));
        assert!(!summary.contains("Sync"));
    }

    #[test]
    fn test_json_fields() {
        let metrics = WorkerMetrics::new();
        metrics.record_sync_completed();
        let json: serde_json::Value =
            serde_json::from_str(&metrics.snapshot().to_json()).unwrap();
        assert_eq!(json["sync_completed"], 1);
    }
}
