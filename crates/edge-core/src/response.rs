//! Response snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body served when neither the network nor the cache can answer.
pub const OFFLINE_BODY: &str = "Offline - content not available";

/// Status used for the synthetic offline response.
pub const OFFLINE_STATUS: u16 = 503;

/// An immutable response snapshot.
///
/// Snapshots are what the cache stores and what every strategy hands back;
/// they are never partially updated, only replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: HashMap<String, String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    /// Create a new response.
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a `200 OK` response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, HashMap::new(), body.into())
    }

    /// The synthetic `503` returned when content is unavailable offline.
    pub fn offline() -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        Self::new(OFFLINE_STATUS, headers, OFFLINE_BODY.as_bytes().to_vec())
    }

    /// Add or replace a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response was a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response was a server error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Whether this is the synthetic offline response.
    pub fn is_offline(&self) -> bool {
        self.status == OFFLINE_STATUS && self.body == OFFLINE_BODY.as_bytes()
    }

    /// Get the response body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get the raw response body.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Get a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }
}
