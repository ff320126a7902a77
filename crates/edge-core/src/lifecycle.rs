//! Worker lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one deployed worker version.
///
/// `Active` is the steady state. A newer version supersedes an active one by
/// running its own lifecycle; the older instance never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Creating partitions and pre-populating must-have assets.
    Installing,
    /// Install succeeded, waiting to be activated.
    Installed,
    /// Purging stale partitions and claiming clients.
    Activating,
    /// Serving requests.
    Active,
    /// Install failed; this version will never activate.
    Redundant,
}

impl WorkerState {
    /// Check whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (Self::Installing, Self::Installed)
                | (Self::Installing, Self::Redundant)
                | (Self::Installed, Self::Activating)
                | (Self::Activating, Self::Active)
        )
    }

    /// Whether requests should be served by this version.
    pub fn is_serving(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}
