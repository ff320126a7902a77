//! Cache debugging headers.

use edge_core::ResponseSnapshot;
use serde::{Deserialize, Serialize};

use crate::policy::{ResourceClass, Strategy};
use crate::strategy::CacheStatus;

/// Header names for cache debugging.
pub mod header_names {
    /// Cache status header (HIT, MISS, STALE, FALLBACK, OFFLINE, BYPASS).
    pub const X_CACHE_STATUS: &str = "X-Cache-Status";
    /// Versioned partition the request was served from.
    pub const X_CACHE_PARTITION: &str = "X-Cache-Partition";
    /// Strategy used to serve the request.
    pub const X_CACHE_STRATEGY: &str = "X-Cache-Strategy";
    /// Resource class assigned by the classifier.
    pub const X_RESOURCE_CLASS: &str = "X-Resource-Class";
}

/// Cache explain headers for debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheExplainHeaders {
    pub status: Option<CacheStatus>,
    pub partition: Option<String>,
    pub strategy: Option<Strategy>,
    pub class: Option<ResourceClass>,
}

impl CacheExplainHeaders {
    /// Create new explain headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache status.
    pub fn with_status(mut self, status: CacheStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Set strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set resource class.
    pub fn with_class(mut self, class: ResourceClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Convert to HTTP headers.
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();

        if let Some(status) = &self.status {
            headers.push((header_names::X_CACHE_STATUS.to_string(), status.to_string()));
        }

        if let Some(partition) = &self.partition {
            headers.push((header_names::X_CACHE_PARTITION.to_string(), partition.clone()));
        }

        if let Some(strategy) = &self.strategy {
            headers.push((header_names::X_CACHE_STRATEGY.to_string(), strategy.to_string()));
        }

        if let Some(class) = &self.class {
            headers.push((header_names::X_RESOURCE_CLASS.to_string(), class.to_string()));
        }

        headers
    }

    /// Write the headers onto a response, replacing existing values.
    pub fn apply(&self, response: &mut ResponseSnapshot) {
        for (name, value) in self.to_headers() {
            response.headers.insert(name, value);
        }
    }

    /// Convert to JSON for debugging output.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
