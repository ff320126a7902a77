//! Timeout configuration for network fetches.

use std::time::Duration;

/// Timeout configuration for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect: Duration,
    /// Total operation timeout.
    pub total: Duration,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, total: Duration) -> Self {
        Self { connect, total }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect: total / 4,
            total,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            total: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_total_splits_connect() {
        let config = TimeoutConfig::from_total(Duration::from_secs(8));
        assert_eq!(config.connect, Duration::from_secs(2));
        assert_eq!(config.total, Duration::from_secs(8));
    }

    #[test]
    fn test_default_connect_below_total() {
        let config = TimeoutConfig::default();
        assert!(config.connect < config.total);
    }
}
