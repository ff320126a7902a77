//! reqwest-backed network fetch.

use std::collections::HashMap;

use async_trait::async_trait;
use edge_core::{FetchRequest, ResponseSnapshot};
use url::Url;

use crate::fetch::{FetchError, NetworkFetch};
use crate::timeout::TimeoutConfig;

/// Fetches requests over HTTP, resolving origin-relative URLs against `origin`.
pub struct HttpFetch {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetch {
    /// Create a fetcher for the given origin with default timeouts.
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        Self::with_timeouts(origin, TimeoutConfig::default())
    }

    /// Create a fetcher with explicit timeouts.
    pub fn with_timeouts(origin: Url, timeouts: TimeoutConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client, origin })
    }

    /// The origin relative URLs are resolved against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a request URL to an absolute one.
    pub fn resolve(&self, raw: &str) -> Result<Url, FetchError> {
        self.origin
            .join(raw)
            .map_err(|e| FetchError::Request(format!("invalid url '{}': {}", raw, e)))
    }
}

#[async_trait]
impl NetworkFetch for HttpFetch {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot, FetchError> {
        let url = self.resolve(&request.url)?;

        let mut builder = self.client.request(request.method.clone(), url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else if e.is_connect() {
                FetchError::Connection(e.to_string())
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        tracing::trace!(url = %url, status, bytes = body.len(), "network fetch completed");

        Ok(ResponseSnapshot::new(status, headers, body.to_vec()))
    }
}
