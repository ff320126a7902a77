//! Cache entry identity.

use chrono::{DateTime, Utc};
use edge_core::{FetchRequest, Method, ResponseSnapshot};
use serde::{Deserialize, Serialize};

/// Identifies a cache entry within a partition.
///
/// Derived from method and URL. Only `GET` requests have an identity, so
/// writes can never be cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestIdentity {
    key: String,
}

impl RequestIdentity {
    /// Identity for a `GET` of `url`. The fragment is not part of it.
    pub fn get(url: impl AsRef<str>) -> Self {
        let url = url.as_ref();
        let url = url.split_once('#').map_or(url, |(before, _)| before);
        Self {
            key: format!("GET {}", url),
        }
    }

    /// Identity for a request, or `None` if it is not a `GET`.
    pub fn for_request(request: &FetchRequest) -> Option<Self> {
        if request.method == Method::GET {
            Some(Self::get(&request.url))
        } else {
            None
        }
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The URL part of the identity.
    pub fn url(&self) -> &str {
        self.key.strip_prefix("GET ").unwrap_or(&self.key)
    }
}

impl std::fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub identity: RequestIdentity,
    pub response: ResponseSnapshot,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(identity: RequestIdentity, response: ResponseSnapshot) -> Self {
        Self {
            identity,
            response,
            stored_at: Utc::now(),
        }
    }

    /// Seconds since the entry was stored.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.stored_at).num_seconds().max(0)
    }
}
