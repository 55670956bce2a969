//! Network fetcher trait and the reqwest-backed implementation.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};

use crate::http::{FetchRequest, StoredResponse};

/// Trait for the outbound network boundary.
///
/// The router only ever talks to the network through this, so tests can
/// script responses and count calls without opening a socket.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
  /// Perform the request. Resolves with whatever the server answered
  /// (including error statuses); rejects only on transport failure.
  async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse>;
}

/// Fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
  async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
      .map_err(|e| eyre!("Invalid method '{}': {}", request.method, e))?;

    let mut builder = self.client.request(method, request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", request.url, e))?
      .to_vec();

    Ok(StoredResponse {
      status,
      headers,
      body,
    })
  }
}
