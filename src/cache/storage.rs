//! Cache storage backends: in-memory and SQLite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use super::traits::CacheStorage;
use crate::http::StoredResponse;

/// In-memory storage backend.
///
/// Used in tests and for hosts that don't want cached data to survive a
/// restart. Stores persist once created, even when emptied.
#[derive(Default)]
pub struct MemoryStorage {
  stores: Mutex<BTreeMap<String, BTreeMap<String, StoredResponse>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores
      .entry(store.to_string())
      .or_default()
      .insert(key.to_string(), response.clone());
    Ok(())
  }

  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.get(store).and_then(|entries| entries.get(key)).cloned())
  }

  fn delete(&self, store: &str, key: &str) -> Result<bool> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .get_mut(store)
        .map(|entries| entries.remove(key).is_some())
        .unwrap_or(false),
    )
  }

  fn keys(&self, store: &str) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      stores
        .get(store)
        .map(|entries| entries.keys().cloned().collect())
        .unwrap_or_default(),
    )
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(stores.keys().cloned().collect())
  }

  fn delete_store(&self, store: &str) -> Result<()> {
    let mut stores = self
      .stores
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    stores.remove(store);
    Ok(())
  }
}

/// SQLite-based storage backend.
///
/// Entries persist across sessions until explicitly evicted, matching the
/// lifetime the worker expects from its cache stores.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an ephemeral in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("nawiri-offline").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per cached response, grouped into named stores
CREATE TABLE IF NOT EXISTS cache_entries (
    store TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    request_key TEXT NOT NULL,
    response BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_store ON cache_entries(store);
"#;

/// SHA256 hash for stable, fixed-length row keys.
fn hash_key(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

impl CacheStorage for SqliteStorage {
  fn put(&self, store: &str, key: &str, response: &StoredResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (store, key_hash, request_key, response, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![store, hash_key(key), key, data],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get(&self, store: &str, key: &str) -> Result<Option<StoredResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT response FROM cache_entries WHERE store = ? AND key_hash = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let data: Option<Vec<u8>> = stmt
      .query_row(params![store, hash_key(key)], |row| row.get(0))
      .ok();

    match data {
      Some(data) => {
        let response: StoredResponse = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize response: {}", e))?;
        Ok(Some(response))
      }
      None => Ok(None),
    }
  }

  fn delete(&self, store: &str, key: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM cache_entries WHERE store = ? AND key_hash = ?",
        params![store, hash_key(key)],
      )
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;

    Ok(removed > 0)
  }

  fn keys(&self, store: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT request_key FROM cache_entries WHERE store = ? ORDER BY request_key")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys: Vec<String> = stmt
      .query_map(params![store], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }

  fn store_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT store FROM cache_entries ORDER BY store")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query store names: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn delete_store(&self, store: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries WHERE store = ?", params![store])
      .map_err(|e| eyre!("Failed to delete store: {}", e))?;

    Ok(())
  }
}
