//! The network fetch capability.

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{FetchRequest, ResponseSnapshot};

/// Error type for fetch operations.
///
/// Any of these is a network failure. A response with an error status is not
/// an error at this layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Body error: {0}")]
    Body(String),
}

/// Performs exactly one network attempt for a request.
#[async_trait]
pub trait NetworkFetch: Send + Sync {
    /// Fetch the request from the network.
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError>;
}

#[async_trait]
impl<T: NetworkFetch + ?Sized> NetworkFetch for Arc<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
        (**self).fetch(request).await
    }
}
