//! Request classification.

use std::collections::HashSet;

use edge_core::{ClassifierConfig, Destination, FetchRequest, WorkerConfig};

use crate::policy::ResourceClass;

/// Maps a request to its [`ResourceClass`].
///
/// Rules are evaluated in priority order and the first match wins:
///
/// 1. `static`: the URL is in the precache allowlist, lies under a static
///    prefix, or names a manifest file.
/// 2. `image`: the request declares an image destination or the path has an
///    image extension.
/// 3. `api`: the path has an API segment, or the host is a telemetry host.
/// 4. `dynamic`: everything else.
///
/// Telemetry matching looks at the host of absolute URLs only, so a
/// first-party path such as `/products/analytics-dashboard` stays `dynamic`.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    allowlist: HashSet<String>,
    rules: ClassifierConfig,
}

impl RequestClassifier {
    /// Create a classifier from an allowlist and rule set.
    pub fn new(allowlist: impl IntoIterator<Item = String>, rules: ClassifierConfig) -> Self {
        Self {
            allowlist: allowlist.into_iter().collect(),
            rules,
        }
    }

    /// Create a classifier whose allowlist is the precache manifest.
    ///
    /// Callers scope request URLs to the configured origin before
    /// classifying, so the allowlist holds the scoped manifest.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.scoped_precache(), config.classifier.clone())
    }

    /// Classify a request. Total: always returns a class.
    pub fn classify(&self, request: &FetchRequest) -> ResourceClass {
        let path = request.path();

        if self.is_static(&request.url, &path) {
            ResourceClass::Static
        } else if self.is_image(request.destination, &path) {
            ResourceClass::Image
        } else if self.is_api(&path, request.host().as_deref()) {
            ResourceClass::Api
        } else {
            ResourceClass::Dynamic
        }
    }

    fn is_static(&self, url: &str, path: &str) -> bool {
        if self.allowlist.contains(url) {
            return true;
        }
        if url.starts_with('/') && self.allowlist.contains(path) {
            return true;
        }
        if self
            .rules
            .static_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        let file_name = path.rsplit('/').next().unwrap_or("");
        self.rules
            .manifest_files
            .iter()
            .any(|manifest| manifest == file_name)
    }

    fn is_image(&self, destination: Destination, path: &str) -> bool {
        if destination == Destination::Image {
            return true;
        }

        let file_name = path.rsplit('/').next().unwrap_or("");
        match file_name.rsplit_once('.') {
            Some((_, ext)) => self
                .rules
                .image_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn is_api(&self, path: &str, host: Option<&str>) -> bool {
        if path
            .split('/')
            .any(|segment| segment == self.rules.api_segment)
        {
            return true;
        }

        match host {
            Some(host) => self
                .rules
                .telemetry_hosts
                .iter()
                .any(|telemetry| host.contains(telemetry.as_str())),
            None => false,
        }
    }
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
