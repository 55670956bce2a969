//! Request and response types shared across the worker.
//!
//! Cached responses are plain serializable values (status, headers, body) so
//! that any storage backend can persist them, and synthetic fallback
//! responses can be built without a network in sight.

use serde::{Deserialize, Serialize};
use url::Url;

/// Header injected into every response written by a strategy handler,
/// holding the RFC 3339 retrieval timestamp used for freshness checks.
pub const CACHE_DATE_HEADER: &str = "X-Cache-Date";

/// A response as stored in (or synthesized for) a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
  pub status: u16,
  /// Header name/value pairs in arrival order. Lookups are case-insensitive.
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl StoredResponse {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.set_header(name, value);
    self
  }

  /// Set a header, replacing any existing value with the same name.
  pub fn set_header(&mut self, name: &str, value: &str) {
    self
      .headers
      .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    self.headers.push((name.to_string(), value.to_string()));
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// A JSON response wrapping an arbitrary payload.
  pub fn json(value: &serde_json::Value) -> Self {
    Self::new(200)
      .with_header("Content-Type", "application/json")
      .with_body(value.to_string())
  }

  /// Minimal HTML substitute served when a navigation has no other fallback.
  pub fn offline_page() -> Self {
    Self::new(200)
      .with_header("Content-Type", "text/html")
      .with_body("<h1>You are offline</h1>")
  }

  /// Empty 404 served for stylesheet/script requests that cannot be satisfied.
  pub fn empty_not_found() -> Self {
    Self::new(404)
  }

  /// Terminal fallback when neither network nor any cache can help.
  pub fn service_unavailable() -> Self {
    Self::new(503).with_body("Offline content not available")
  }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  /// Upper-case HTTP method, e.g. "GET".
  pub method: String,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
  /// Whether this is a page navigation rather than a subresource load.
  pub navigate: bool,
}

impl FetchRequest {
  pub fn new(method: &str, url: Url) -> Self {
    Self {
      method: method.to_uppercase(),
      url,
      headers: Vec::new(),
      body: None,
      navigate: false,
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new("GET", url)
  }

  /// A GET request flagged as a page navigation.
  pub fn navigation(url: Url) -> Self {
    let mut request = Self::get(url);
    request.navigate = true;
    request
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  pub fn is_get(&self) -> bool {
    self.method == "GET"
  }

  /// Cache store key for this request: path plus query string.
  ///
  /// Keys are origin-free because the worker only ever serves its own
  /// origin; this keeps install-time keys ("/offline") and runtime keys
  /// pointing at the same entries.
  pub fn cache_key(&self) -> String {
    match self.url.query() {
      Some(query) => format!("{}?{}", self.url.path(), query),
      None => self.url.path().to_string(),
    }
  }
}
