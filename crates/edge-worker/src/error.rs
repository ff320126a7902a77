//! Worker errors.

use edge_cache::CacheError;
use edge_core::{ConfigError, WorkerState};

/// Errors raised while dispatching worker events.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Install could not prepare the partitions. The previous version stays active.
    #[error("install failed: {0}")]
    Install(#[source] CacheError),

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error("worker is not active")]
    NotActive,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("notification error: {0}")]
    Notification(String),
}

/// Errors raised by a client registry or a client handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The client went away.
    #[error("client {0} is gone")]
    Gone(String),

    /// The platform refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),
}
