//! Intercepted request representation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

pub use http::Method;
pub use url::Url;

/// Unique request identifier for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = NEXT_REQUEST.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP headers.
pub type Headers = HashMap<String, String>;

/// The resource type a request declares it is fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Audio,
    Video,
    Worker,
    /// `fetch()`/XHR with no declared destination.
    #[default]
    Empty,
}

impl Destination {
    /// Get the destination name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Script => "script",
            Self::Style => "style",
            Self::Image => "image",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Worker => "worker",
            Self::Empty => "",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Error returned when a destination name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request destination: {0}")]
pub struct UnknownDestination(pub String);

impl FromStr for Destination {
    type Err = UnknownDestination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "manifest" => Ok(Self::Manifest),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "worker" => Ok(Self::Worker),
            "" | "empty" => Ok(Self::Empty),
            other => Err(UnknownDestination(other.to_string())),
        }
    }
}

/// A request intercepted by the worker.
///
/// `url` is either absolute (`https://host/path`) or origin-relative
/// (`/path?query`); both forms are accepted everywhere a URL is inspected.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Declared destination.
    pub destination: Destination,
    /// HTTP headers.
    pub headers: Headers,
    /// Request body, only ever present on non-GET requests.
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    /// Create a new request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            method,
            url: url.into(),
            destination: Destination::Empty,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set the declared destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether this request is eligible for caching at all.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The URL path without query string or fragment.
    pub fn path(&self) -> String {
        if self.url.starts_with('/') {
            let end = self
                .url
                .find(|c| c == '?' || c == '#')
                .unwrap_or(self.url.len());
            return self.url[..end].to_string();
        }

        match url::Url::parse(&self.url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => self.url.clone(),
        }
    }

    /// The host for absolute URLs; `None` for origin-relative ones.
    pub fn host(&self) -> Option<String> {
        if self.url.starts_with('/') {
            return None;
        }
        url::Url::parse(&self.url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// Rewrite a same-origin absolute URL to origin-relative form.
    ///
    /// Relative URLs and URLs on other origins are left untouched.
    pub fn scoped_to(mut self, origin: &Url) -> Self {
        if let Some(relative) = relative_to_origin(&self.url, origin) {
            self.url = relative;
        }
        self
    }
}

/// Origin-relative form of `url` if it is an absolute URL on `origin`.
pub fn relative_to_origin(url: &str, origin: &Url) -> Option<String> {
    if url.starts_with('/') {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if parsed.origin() != origin.origin() {
        return None;
    }

    let mut relative = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    Some(relative)
}
