//! Logging setup.
//!
//! Every crate in the workspace logs through the `tracing` facade. This module
//! installs the global subscriber once per process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log level used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (for log aggregation).
    Json,
    /// Human-readable format (for development).
    #[default]
    Human,
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.filter().into())
        .from_env_lossy()
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr. `RUST_LOG` takes precedence over `level`. Returns
/// `false` if a subscriber was already installed, which makes repeated calls
/// harmless.
pub fn init_logging(format: LogFormat, level: LogLevel) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Human => builder.compact().try_init(),
    };

    result.is_ok()
}

/// Install a subscriber that writes through the test harness capture.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(LogLevel::Debug))
        .with_test_writer()
        .try_init();
}
