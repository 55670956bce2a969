//! Storage contract for named cache stores.

use color_eyre::Result;

use crate::http::StoredResponse;

/// Versioned names of the three stores owned by the current worker.
///
/// Old-version stores carry the same prefix but a different version suffix,
/// which is what the activation sweep keys on.
#[derive(Debug, Clone)]
pub struct CacheNames {
  prefix: String,
  /// Application shell and precached assets: `<prefix>-<version>`
  pub shell: String,
  /// Strategy-cached API responses: `<prefix>-api-<version>`
  pub api: String,
  /// Per-route offline substitutes: `<prefix>-offline-<version>`
  pub offline: String,
}

impl CacheNames {
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      prefix: prefix.to_string(),
      shell: format!("{}-{}", prefix, version),
      api: format!("{}-api-{}", prefix, version),
      offline: format!("{}-offline-{}", prefix, version),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  /// Whether a store name belongs to the current worker version.
  pub fn is_current(&self, name: &str) -> bool {
    name == self.shell || name == self.api || name == self.offline
  }
}

/// Trait for cache storage backends.
///
/// A backend holds any number of named stores, each mapping a request key
/// to a stored response. Implementations must be safe for concurrent use;
/// per-key reads and writes are atomic but no cross-key transactions are
/// assumed.
pub trait CacheStorage: Send + Sync {
  /// Store a response under `key` in the named store, creating the store
  /// if needed and replacing any existing entry.
  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()>;

  /// Look up a response by key.
  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>>;

  /// Delete a single entry. Returns true if an entry was removed.
  fn delete(&self, store: &str, key: &str) -> Result<bool>;

  /// All keys currently present in the named store.
  fn keys(&self, store: &str) -> Result<Vec<String>>;

  /// Names of all stores known to this backend.
  fn store_names(&self) -> Result<Vec<String>>;

  /// Delete a whole store and everything in it.
  fn delete_store(&self, store: &str) -> Result<()>;
}
