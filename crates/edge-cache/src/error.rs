//! Cache errors.

use edge_data::FetchError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A partition that should exist does not.
    #[error("partition missing: {0}")]
    PartitionMissing(String),

    /// A manifest entry could not be pre-populated.
    #[error("failed to precache {url}: {reason}")]
    Precache { url: String, reason: String },

    /// Network failure surfaced from a fetch.
    #[error("network error: {0}")]
    Network(#[from] FetchError),
}
