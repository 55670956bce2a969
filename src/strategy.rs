//! Caching strategies for API requests.
//!
//! Each strategy decides the order of network vs. cache consultation and
//! how long a cached entry is trusted. All three write through the same
//! API store and stamp entries with a retrieval timestamp at write time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;

use crate::cache::CacheStorage;
use crate::http::{FetchRequest, StoredResponse, CACHE_DATE_HEADER};
use crate::net::NetworkFetcher;
use crate::routes::Strategy;

/// Stamp a response with the retrieval timestamp used for freshness checks.
pub fn stamp_cache_date(response: StoredResponse, now: DateTime<Utc>) -> StoredResponse {
  response.with_header(CACHE_DATE_HEADER, &now.to_rfc3339())
}

/// Whether a cached entry is still fresh at `now`.
///
/// An entry with no stamp is unconditionally valid (precache and
/// manually-seeded content). An entry whose age equals the max age is
/// already stale. An unparseable stamp counts as stale.
pub fn is_valid_at(response: &StoredResponse, max_age: Duration, now: DateTime<Utc>) -> bool {
  let Some(stamp) = response.header(CACHE_DATE_HEADER) else {
    return true;
  };
  let Ok(stored) = DateTime::parse_from_rfc3339(stamp) else {
    return false;
  };
  now.signed_duration_since(stored.with_timezone(&Utc)) < max_age
}

/// Freshness check against the current time.
pub fn is_cache_valid(response: &StoredResponse, max_age: Duration) -> bool {
  is_valid_at(response, max_age, Utc::now())
}

/// Executes caching strategies against the API store.
pub struct StrategyExecutor<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn NetworkFetcher>,
  api_store: String,
}

impl<S: CacheStorage + 'static> StrategyExecutor<S> {
  pub fn new(storage: Arc<S>, fetcher: Arc<dyn NetworkFetcher>, api_store: String) -> Self {
    Self {
      storage,
      fetcher,
      api_store,
    }
  }

  /// Run the given strategy for a request.
  pub async fn execute(
    &self,
    strategy: Strategy,
    request: &FetchRequest,
    max_age: Duration,
  ) -> Result<StoredResponse> {
    match strategy {
      Strategy::NetworkFirst => self.network_first(request, max_age).await,
      Strategy::CacheFirst => self.cache_first(request, max_age).await,
      Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, max_age).await,
    }
  }

  /// Network first; a cached entry is only served on network failure and
  /// only while fresh. Never serves stale data.
  pub async fn network_first(
    &self,
    request: &FetchRequest,
    max_age: Duration,
  ) -> Result<StoredResponse> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.store(request, &response)?;
        Ok(response)
      }
      Err(err) => {
        if let Some(cached) = self.storage.get(&self.api_store, &request.cache_key())? {
          if is_cache_valid(&cached, max_age) {
            return Ok(cached);
          }
        }
        // No valid cache available
        Err(err)
      }
    }
  }

  /// Cache first; a fresh entry short-circuits the network entirely. On
  /// network failure an existing entry is served even when stale.
  pub async fn cache_first(
    &self,
    request: &FetchRequest,
    max_age: Duration,
  ) -> Result<StoredResponse> {
    let cached = self.storage.get(&self.api_store, &request.cache_key())?;
    if let Some(ref response) = cached {
      if is_cache_valid(response, max_age) {
        return Ok(response.clone());
      }
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.store(request, &response)?;
        Ok(response)
      }
      Err(err) => cached.ok_or(err),
    }
  }

  /// A fresh entry is returned immediately while a detached task refreshes
  /// the store; otherwise fetch synchronously and fall back to a stale
  /// entry only when the network fails.
  pub async fn stale_while_revalidate(
    &self,
    request: &FetchRequest,
    max_age: Duration,
  ) -> Result<StoredResponse> {
    let cached = self.storage.get(&self.api_store, &request.cache_key())?;
    if let Some(ref response) = cached {
      if is_cache_valid(response, max_age) {
        self.spawn_revalidate(request.clone());
        return Ok(response.clone());
      }
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.store(request, &response)?;
        Ok(response)
      }
      Err(err) => cached.ok_or(err),
    }
  }

  fn store(&self, request: &FetchRequest, response: &StoredResponse) -> Result<()> {
    let stamped = stamp_cache_date(response.clone(), Utc::now());
    self
      .storage
      .put(&self.api_store, &request.cache_key(), &stamped)
  }

  /// Fire-and-forget background refresh. Failures are logged, never
  /// surfaced to the response that triggered them.
  fn spawn_revalidate(&self, request: FetchRequest) {
    let storage = Arc::clone(&self.storage);
    let fetcher = Arc::clone(&self.fetcher);
    let api_store = self.api_store.clone();

    tokio::spawn(async move {
      match fetcher.fetch(&request).await {
        Ok(response) => {
          let stamped = stamp_cache_date(response, Utc::now());
          if let Err(err) = storage.put(&api_store, &request.cache_key(), &stamped) {
            tracing::warn!(url = %request.url, "background refresh store failed: {}", err);
          }
        }
        Err(err) => {
          tracing::debug!(url = %request.url, "background refresh failed: {}", err);
        }
      }
    });
  }
}

impl<S: CacheStorage> Clone for StrategyExecutor<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      api_store: self.api_store.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::testing::{get, response, stamped_response, FakeNetwork};

  const API_STORE: &str = "nawiri-cache-api-test";

  fn executor(
    storage: Arc<MemoryStorage>,
    network: Arc<FakeNetwork>,
  ) -> StrategyExecutor<MemoryStorage> {
    StrategyExecutor::new(storage, network, API_STORE.to_string())
  }

  async fn wait_for_calls(network: &FakeNetwork, expected: usize) {
    for _ in 0..100 {
      if network.calls() >= expected {
        return;
      }
      tokio::task::yield_now().await;
    }
  }

  // ===== Freshness =====

  #[test]
  fn test_entry_without_stamp_is_always_valid() {
    let response = response("precached");
    assert!(is_valid_at(&response, Duration::seconds(0), Utc::now()));
  }

  #[test]
  fn test_freshness_boundary() {
    let now = Utc::now();
    let max_age = Duration::seconds(60);
    let entry = |age_secs: i64| {
      stamp_cache_date(response("x"), now - Duration::seconds(age_secs))
    };

    assert!(is_valid_at(&entry(0), max_age, now));
    assert!(is_valid_at(&entry(59), max_age, now));
    // Age equal to max age is already stale
    assert!(!is_valid_at(&entry(60), max_age, now));
    assert!(!is_valid_at(&entry(61), max_age, now));
  }

  #[test]
  fn test_unparseable_stamp_is_stale() {
    let entry = response("x").with_header(CACHE_DATE_HEADER, "not a date");
    assert!(!is_valid_at(&entry, Duration::seconds(3600), Utc::now()));
  }

  // ===== network-first =====

  #[tokio::test]
  async fn test_network_first_stores_and_returns_network_response() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::new());
    network.respond("/api/sales", response("fresh sales"));
    let exec = executor(Arc::clone(&storage), Arc::clone(&network));

    let result = exec
      .network_first(&get("/api/sales"), Duration::seconds(1800))
      .await
      .unwrap();
    assert_eq!(result.body, b"fresh sales");

    let cached = storage.get(API_STORE, "/api/sales").unwrap().unwrap();
    assert_eq!(cached.body, b"fresh sales");
    assert!(cached.header(CACHE_DATE_HEADER).is_some());
  }

  #[tokio::test]
  async fn test_network_first_serves_fresh_cache_on_failure() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/sales", &stamped_response("cached sales", 60))
      .unwrap();
    let network = Arc::new(FakeNetwork::offline());
    let exec = executor(Arc::clone(&storage), network);

    let result = exec
      .network_first(&get("/api/sales"), Duration::seconds(1800))
      .await
      .unwrap();
    assert_eq!(result.body, b"cached sales");
  }

  #[tokio::test]
  async fn test_network_first_never_serves_stale() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/sales", &stamped_response("old sales", 7200))
      .unwrap();
    let network = Arc::new(FakeNetwork::offline());
    let exec = executor(Arc::clone(&storage), network);

    let result = exec
      .network_first(&get("/api/sales"), Duration::seconds(1800))
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_network_first_fails_on_cache_miss() {
    let exec = executor(
      Arc::new(MemoryStorage::new()),
      Arc::new(FakeNetwork::offline()),
    );
    let result = exec
      .network_first(&get("/api/sales"), Duration::seconds(1800))
      .await;
    assert!(result.is_err());
  }

  // ===== cache-first =====

  #[tokio::test]
  async fn test_cache_first_fresh_entry_skips_network() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/inventory", &stamped_response("stock", 60))
      .unwrap();
    let network = Arc::new(FakeNetwork::new());
    let exec = executor(storage, Arc::clone(&network));

    for _ in 0..3 {
      let result = exec
        .cache_first(&get("/api/inventory"), Duration::seconds(86400))
        .await
        .unwrap();
      assert_eq!(result.body, b"stock");
    }
    assert_eq!(network.calls(), 0);
  }

  #[tokio::test]
  async fn test_cache_first_fetches_when_stale() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/inventory", &stamped_response("old stock", 90000))
      .unwrap();
    let network = Arc::new(FakeNetwork::new());
    network.respond("/api/inventory", response("new stock"));
    let exec = executor(Arc::clone(&storage), Arc::clone(&network));

    let result = exec
      .cache_first(&get("/api/inventory"), Duration::seconds(86400))
      .await
      .unwrap();
    assert_eq!(result.body, b"new stock");
    assert_eq!(network.calls(), 1);

    let cached = storage.get(API_STORE, "/api/inventory").unwrap().unwrap();
    assert_eq!(cached.body, b"new stock");
  }

  #[tokio::test]
  async fn test_cache_first_serves_stale_on_network_failure() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/inventory", &stamped_response("old stock", 90000))
      .unwrap();
    let exec = executor(storage, Arc::new(FakeNetwork::offline()));

    let result = exec
      .cache_first(&get("/api/inventory"), Duration::seconds(86400))
      .await
      .unwrap();
    assert_eq!(result.body, b"old stock");
  }

  #[tokio::test]
  async fn test_cache_first_fails_with_no_cache_and_no_network() {
    let exec = executor(
      Arc::new(MemoryStorage::new()),
      Arc::new(FakeNetwork::offline()),
    );
    let result = exec
      .cache_first(&get("/api/inventory"), Duration::seconds(86400))
      .await;
    assert!(result.is_err());
  }

  // ===== stale-while-revalidate =====

  #[tokio::test]
  async fn test_swr_fresh_entry_returns_immediately_and_refreshes_once() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/products", &stamped_response("cached products", 60))
      .unwrap();
    let network = Arc::new(FakeNetwork::new());
    network.respond("/api/products", response("refreshed products"));
    let exec = executor(Arc::clone(&storage), Arc::clone(&network));

    let result = exec
      .stale_while_revalidate(&get("/api/products"), Duration::seconds(3600))
      .await
      .unwrap();
    // Cached copy served without waiting on the network
    assert_eq!(result.body, b"cached products");

    wait_for_calls(&network, 1).await;
    assert_eq!(network.calls(), 1);

    let cached = storage.get(API_STORE, "/api/products").unwrap().unwrap();
    assert_eq!(cached.body, b"refreshed products");
  }

  #[tokio::test]
  async fn test_swr_background_failure_is_swallowed() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/products", &stamped_response("cached products", 60))
      .unwrap();
    let network = Arc::new(FakeNetwork::offline());
    let exec = executor(Arc::clone(&storage), Arc::clone(&network));

    let result = exec
      .stale_while_revalidate(&get("/api/products"), Duration::seconds(3600))
      .await
      .unwrap();
    assert_eq!(result.body, b"cached products");

    wait_for_calls(&network, 1).await;
    // Cached entry untouched by the failed refresh
    let cached = storage.get(API_STORE, "/api/products").unwrap().unwrap();
    assert_eq!(cached.body, b"cached products");
  }

  #[tokio::test]
  async fn test_swr_no_fresh_entry_fetches_synchronously() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::new());
    network.respond("/api/products", response("network products"));
    let exec = executor(Arc::clone(&storage), Arc::clone(&network));

    let result = exec
      .stale_while_revalidate(&get("/api/products"), Duration::seconds(3600))
      .await
      .unwrap();
    assert_eq!(result.body, b"network products");
    assert_eq!(network.calls(), 1);
    assert!(storage.get(API_STORE, "/api/products").unwrap().is_some());
  }

  #[tokio::test]
  async fn test_swr_serves_stale_when_network_fails() {
    let storage = Arc::new(MemoryStorage::new());
    storage
      .put(API_STORE, "/api/products", &stamped_response("stale products", 7200))
      .unwrap();
    let exec = executor(storage, Arc::new(FakeNetwork::offline()));

    let result = exec
      .stale_while_revalidate(&get("/api/products"), Duration::seconds(3600))
      .await
      .unwrap();
    assert_eq!(result.body, b"stale products");
  }

  #[tokio::test]
  async fn test_swr_fails_with_no_cache_and_no_network() {
    let exec = executor(
      Arc::new(MemoryStorage::new()),
      Arc::new(FakeNetwork::offline()),
    );
    let result = exec
      .stale_while_revalidate(&get("/api/products"), Duration::seconds(3600))
      .await;
    assert!(result.is_err());
  }
}
