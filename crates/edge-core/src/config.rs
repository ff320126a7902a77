//! Worker configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("version must not be empty")]
    EmptyVersion,

    #[error("partition base names must be unique, '{0}' appears twice")]
    DuplicatePartition(String),

    #[error("partition base name must not be empty")]
    EmptyPartition,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("precache entry '{0}' is neither an absolute path nor a URL")]
    InvalidPrecacheEntry(String),

    #[error("sync tag must not be empty")]
    EmptySyncTag,

    #[error("origin '{0}' is not an absolute URL")]
    InvalidOrigin(String),
}

/// Configuration for one deployed worker version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Deploy version; bumped whenever cached content changes.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin the worker is scoped to. Absolute URLs on this origin are
    /// treated as their origin-relative form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Partition base names.
    #[serde(default)]
    pub partitions: PartitionNames,

    /// Must-have assets fetched into the static partition at install.
    /// Also the static allowlist used by the classifier.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Request classification rules.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Period of the orphan partition sweep in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// The recognised background-sync tag.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Attach `X-Cache-*` debug headers to served responses.
    #[serde(default)]
    pub explain_headers: bool,

    /// Push notification presentation.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/static/js/bundle.js",
        "/static/css/main.css",
        "/manifest.json",
        "/favicon.ico",
        "/logo192.png",
        "/logo512.png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sweep_interval() -> u64 {
    24 * 60 * 60
}

fn default_sync_tag() -> String {
    "background-sync".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: None,
            partitions: PartitionNames::default(),
            precache: default_precache(),
            classifier: ClassifierConfig::default(),
            sweep_interval_secs: default_sweep_interval(),
            sync_tag: default_sync_tag(),
            explain_headers: false,
            notifications: NotificationConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration for the given deploy version.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Replace the precache manifest.
    pub fn with_precache(mut self, urls: Vec<&str>) -> Self {
        self.precache = urls.into_iter().map(String::from).collect();
        self
    }

    /// Scope the worker to an origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// The parsed origin, if one is configured and valid.
    pub fn origin_url(&self) -> Option<url::Url> {
        self.origin.as_deref().and_then(|o| url::Url::parse(o).ok())
    }

    /// The precache manifest with same-origin URLs made origin-relative.
    pub fn scoped_precache(&self) -> Vec<String> {
        let origin = self.origin_url();
        self.precache
            .iter()
            .map(|entry| {
                origin
                    .as_ref()
                    .and_then(|o| crate::request::relative_to_origin(entry, o))
                    .unwrap_or_else(|| entry.clone())
            })
            .collect()
    }

    /// Set the sweep period.
    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Enable or disable explain headers.
    pub fn with_explain_headers(mut self, enabled: bool) -> Self {
        self.explain_headers = enabled;
        self
    }

    /// Check the configuration for values that would break the worker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }

        let mut seen = HashSet::new();
        for name in self.partitions.all() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyPartition);
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicatePartition(name.to_string()));
            }
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }

        if self.sync_tag.trim().is_empty() {
            return Err(ConfigError::EmptySyncTag);
        }

        if let Some(origin) = &self.origin {
            match url::Url::parse(origin) {
                Ok(parsed) if parsed.has_host() => {}
                _ => return Err(ConfigError::InvalidOrigin(origin.clone())),
            }
        }

        for entry in &self.precache {
            if !entry.starts_with('/') && url::Url::parse(entry).is_err() {
                return Err(ConfigError::InvalidPrecacheEntry(entry.clone()));
            }
        }

        Ok(())
    }
}

/// Base names of the three partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionNames {
    #[serde(rename = "static", default = "default_static")]
    pub static_assets: String,
    #[serde(default = "default_dynamic")]
    pub dynamic: String,
    #[serde(default = "default_image")]
    pub image: String,
}

fn default_static() -> String {
    "static".to_string()
}

fn default_dynamic() -> String {
    "dynamic".to_string()
}

fn default_image() -> String {
    "image".to_string()
}

impl Default for PartitionNames {
    fn default() -> Self {
        Self {
            static_assets: default_static(),
            dynamic: default_dynamic(),
            image: default_image(),
        }
    }
}

impl PartitionNames {
    /// All base names in a fixed order.
    pub fn all(&self) -> [&str; 3] {
        [&self.static_assets, &self.dynamic, &self.image]
    }
}

/// Rules used to assign resource classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Path prefixes reserved for static assets.
    #[serde(default = "default_static_prefixes")]
    pub static_prefixes: Vec<String>,

    /// File names treated as web app manifests.
    #[serde(default = "default_manifest_files")]
    pub manifest_files: Vec<String>,

    /// Image file extensions (compared case-insensitively, without the dot).
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Path segment marking API requests.
    #[serde(default = "default_api_segment")]
    pub api_segment: String,

    /// Third-party analytics/telemetry host substrings.
    #[serde(default = "default_telemetry_hosts")]
    pub telemetry_hosts: Vec<String>,
}

fn default_static_prefixes() -> Vec<String> {
    vec!["/static/".to_string()]
}

fn default_manifest_files() -> Vec<String> {
    vec!["manifest.json".to_string(), "site.webmanifest".to_string()]
}

fn default_image_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_api_segment() -> String {
    "api".to_string()
}

fn default_telemetry_hosts() -> Vec<String> {
    [
        "google-analytics.com",
        "googletagmanager.com",
        "analytics.google.com",
        "doubleclick.net",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            static_prefixes: default_static_prefixes(),
            manifest_files: default_manifest_files(),
            image_extensions: default_image_extensions(),
            api_segment: default_api_segment(),
            telemetry_hosts: default_telemetry_hosts(),
        }
    }
}

/// Push notification presentation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Body used when the push payload carries no text.
    #[serde(default = "default_body")]
    pub default_body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_badge")]
    pub badge: String,
    /// Vibration pattern in milliseconds.
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
    /// Fixed tag; a new notification replaces any displayed one with this tag.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// URL opened or focused on click.
    #[serde(default = "default_root_url")]
    pub root_url: String,
    #[serde(default = "default_explore_title")]
    pub explore_title: String,
    #[serde(default = "default_close_title")]
    pub close_title: String,
}

fn default_title() -> String {
    "TurboCommerce".to_string()
}

fn default_body() -> String {
    "New update available!".to_string()
}

fn default_icon() -> String {
    "/logo192.png".to_string()
}

fn default_badge() -> String {
    "/logo192.png".to_string()
}

fn default_vibrate() -> Vec<u32> {
    vec![100, 50, 100]
}

fn default_tag() -> String {
    "store-update".to_string()
}

fn default_root_url() -> String {
    "/".to_string()
}

fn default_explore_title() -> String {
    "View Products".to_string()
}

fn default_close_title() -> String {
    "Close".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            default_body: default_body(),
            icon: default_icon(),
            badge: default_badge(),
            vibrate: default_vibrate(),
            tag: default_tag(),
            root_url: default_root_url(),
            explore_title: default_explore_title(),
            close_title: default_close_title(),
        }
    }
}
