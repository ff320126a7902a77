//! Resource classes and the strategy each one is served with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category assigned to a request.
///
/// Assigned once per request and never changed while it is being handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Build assets, the shell and manifests.
    Static,
    /// Images.
    Image,
    /// API calls and telemetry.
    Api,
    /// Everything else, usually navigations.
    Dynamic,
}

impl ResourceClass {
    /// All classes in classification priority order.
    pub const ALL: [ResourceClass; 4] = [Self::Static, Self::Image, Self::Api, Self::Dynamic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Image => "image",
            Self::Api => "api",
            Self::Dynamic => "dynamic",
        }
    }

    /// The strategy requests of this class are served with.
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Static | Self::Image => Strategy::CacheFirst,
            Self::Api => Strategy::NetworkFirst,
            Self::Dynamic => Strategy::StaleWhileRevalidate,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource class: {}", s))
    }
}

/// A fetch/serve algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from the partition, fetch only on a miss.
    CacheFirst,
    /// Prefer the network, fall back to the partition on failure.
    NetworkFirst,
    /// Serve the cached entry immediately and refresh it in the background.
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
