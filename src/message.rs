//! Control messages posted from pages to the worker.

use serde::Deserialize;

/// A control message, tagged by its `action` field on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum ControlMessage {
  /// Force the new worker version to take over now.
  #[serde(rename = "SKIP_WAITING")]
  SkipWaiting,
  /// Fetch a single URL and add it to the shell store.
  #[serde(rename = "UPDATE_CACHE")]
  UpdateCache { url: String },
  /// Store an arbitrary JSON payload under the fixed app-data key.
  #[serde(rename = "CACHE_DATA")]
  CacheData { data: serde_json::Value },
  /// Retrieve the stored payload back via the reply channel.
  #[serde(rename = "GET_CACHED_DATA")]
  GetCachedData,
}

/// Ad hoc store holding the page-supplied JSON payload.
pub const APP_DATA_STORE: &str = "app-data";

/// Fixed key the payload lives under.
pub const APP_DATA_KEY: &str = "/api/data";
