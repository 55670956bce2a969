//! Request classification and dispatch.
//!
//! Every intercepted request ends in exactly one of: pass-through, an API
//! strategy, the navigation handler, or the default asset strategy. Pages
//! never see an unhandled failure from the last two; they always resolve
//! to some response.

use std::sync::Arc;

use color_eyre::Result;

use crate::cache::{CacheNames, CacheStorage};
use crate::config::Config;
use crate::http::{FetchRequest, StoredResponse};
use crate::net::NetworkFetcher;
use crate::routes::RouteTable;
use crate::strategy::StrategyExecutor;

/// What the router decided to do with a request.
#[derive(Debug)]
pub enum RouteOutcome {
  /// Serve this response to the page.
  Response(StoredResponse),
  /// Not ours to handle; let the request pass through untouched.
  PassThrough,
}

impl RouteOutcome {
  pub fn into_response(self) -> Option<StoredResponse> {
    match self {
      RouteOutcome::Response(response) => Some(response),
      RouteOutcome::PassThrough => None,
    }
  }
}

/// Routes intercepted requests to caching strategies and fallbacks.
pub struct RequestRouter<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn NetworkFetcher>,
  strategies: StrategyExecutor<S>,
  table: RouteTable,
  names: CacheNames,
  offline_page: String,
  placeholder_image: String,
  excluded_prefixes: Vec<String>,
}

impl<S: CacheStorage + 'static> RequestRouter<S> {
  pub fn new(
    config: &Config,
    names: CacheNames,
    table: RouteTable,
    storage: Arc<S>,
    fetcher: Arc<dyn NetworkFetcher>,
  ) -> Self {
    let strategies = StrategyExecutor::new(
      Arc::clone(&storage),
      Arc::clone(&fetcher),
      names.api.clone(),
    );

    Self {
      storage,
      fetcher,
      strategies,
      table,
      names,
      offline_page: config.offline_page.clone(),
      placeholder_image: config.placeholder_image.clone(),
      excluded_prefixes: config.excluded_prefixes.clone(),
    }
  }

  /// Classify and handle one request.
  pub async fn route(&self, request: &FetchRequest) -> Result<RouteOutcome> {
    // Non-idempotent methods and non-network schemes pass through untouched
    if !request.is_get() || !matches!(request.url.scheme(), "http" | "https") {
      return Ok(RouteOutcome::PassThrough);
    }

    let path = request.url.path().to_string();

    if let Some(rule) = self.table.api_rule(&path) {
      let response = self
        .strategies
        .execute(rule.strategy, request, rule.max_age)
        .await?;
      return Ok(RouteOutcome::Response(response));
    }

    if request.navigate {
      return Ok(RouteOutcome::Response(self.navigate(request).await));
    }

    Ok(RouteOutcome::Response(self.default_asset(request).await?))
  }

  /// Network first for page navigations; always resolves to HTML.
  async fn navigate(&self, request: &FetchRequest) -> StoredResponse {
    match self.fetcher.fetch(request).await {
      Ok(response) => response,
      Err(err) => {
        tracing::debug!(url = %request.url, "navigation fetch failed: {}", err);
        match self.storage.get(&self.names.shell, &self.offline_page) {
          Ok(Some(offline)) => offline,
          // Ultimate fallback
          _ => StoredResponse::offline_page(),
        }
      }
    }
  }

  /// Cache-first with no age limit for all other assets. The lookup spans
  /// both content stores, so a directly requested offline substitute is
  /// served from cache like any precached asset.
  async fn default_asset(&self, request: &FetchRequest) -> Result<StoredResponse> {
    let key = request.cache_key();
    if let Some(cached) = self.storage.get(&self.names.shell, &key)? {
      return Ok(cached);
    }
    if let Some(cached) = self.storage.get(&self.names.offline, &key)? {
      return Ok(cached);
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if self.is_cacheable(request) {
          self.storage.put(&self.names.shell, &key, &response)?;
        }
        Ok(response)
      }
      Err(err) => {
        tracing::debug!(url = %request.url, "asset fetch failed: {}", err);
        self.asset_fallback(request)
      }
    }
  }

  /// Failure chain for assets: empty 404 for styles/scripts, placeholder
  /// for images, registered offline substitute for dynamic routes, 503
  /// for everything else.
  fn asset_fallback(&self, request: &FetchRequest) -> Result<StoredResponse> {
    let accept = request.header("accept").unwrap_or("");

    if accept.contains("text/css") || accept.contains("application/javascript") {
      return Ok(StoredResponse::empty_not_found());
    }

    if accept.contains("image") {
      if let Some(placeholder) = self
        .storage
        .get(&self.names.shell, &self.placeholder_image)?
      {
        return Ok(placeholder);
      }
    }

    if let Some(fallback) = self.table.offline_fallback(request.url.path()) {
      if let Some(cached) = self.storage.get(&self.names.offline, fallback)? {
        return Ok(cached);
      }
    }

    Ok(StoredResponse::service_unavailable())
  }

  /// Whether a fetched asset may be persisted into the shell store.
  fn is_cacheable(&self, request: &FetchRequest) -> bool {
    if request.url.scheme() != "https" {
      return false;
    }
    let path = request.url.path();
    if self
      .excluded_prefixes
      .iter()
      .any(|prefix| path.starts_with(prefix.as_str()))
    {
      return false;
    }
    !request
      .header("cache-control")
      .map(|value| value.contains("no-store"))
      .unwrap_or(false)
  }
}

impl<S: CacheStorage> Clone for RequestRouter<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      strategies: self.strategies.clone(),
      table: self.table.clone(),
      names: self.names.clone(),
      offline_page: self.offline_page.clone(),
      placeholder_image: self.placeholder_image.clone(),
      excluded_prefixes: self.excluded_prefixes.clone(),
    }
  }
}
