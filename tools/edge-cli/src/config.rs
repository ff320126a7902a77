//! CLI configuration.

use anyhow::{Context, Result};
use edge_core::WorkerConfig;
use edge_observability::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Origin that relative request URLs resolve against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Generate a default config file.
pub fn generate_default_config(origin: &str) -> String {
    format!(
        r#"# Edge offline worker configuration

origin = "{origin}"

[worker]
# Bump on every deploy that changes cached content
version = "1"
sweep_interval_secs = 86400
sync_tag = "background-sync"
explain_headers = false

# Must-have assets fetched at install
precache = [
    "/",
    "/index.html",
    "/static/js/bundle.js",
    "/static/css/main.css",
    "/manifest.json",
    "/favicon.ico",
]

[worker.partitions]
static = "static"
dynamic = "dynamic"
image = "image"

[worker.classifier]
static_prefixes = ["/static/"]
manifest_files = ["manifest.json", "site.webmanifest"]
image_extensions = ["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"]
api_segment = "api"
telemetry_hosts = ["google-analytics.com", "googletagmanager.com"]

[logging]
level = "info"
format = "human"
"#
    )
}
