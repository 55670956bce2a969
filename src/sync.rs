//! Background synchronization of queued writes.
//!
//! Pages queue mutating requests into the pending store while offline; a
//! sync trigger replays them. Delivery is at-least-once with no ordering
//! guarantee: every replay is independent and a failure leaves just that
//! entry queued for the next trigger.

use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheStorage;
use crate::http::{FetchRequest, StoredResponse};
use crate::net::NetworkFetcher;

/// Store holding queued mutating requests awaiting replay.
pub const PENDING_STORE: &str = "pending-orders";

/// Sync trigger tag that flushes the pending store.
pub const SYNC_TAG: &str = "sync-pending-orders";

/// A queued request, serialized into the pending store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
  pub method: String,
  pub url: String,
  #[serde(default)]
  pub headers: Vec<(String, String)>,
  #[serde(default)]
  pub body: Option<Vec<u8>>,
}

impl PendingRequest {
  fn into_fetch(self) -> Result<FetchRequest> {
    let url = Url::parse(&self.url).map_err(|e| eyre!("Invalid pending URL '{}': {}", self.url, e))?;
    let mut request = FetchRequest::new(&self.method, url);
    request.headers = self.headers;
    request.body = self.body;
    Ok(request)
  }
}

/// Replays queued writes against the network.
pub struct SyncManager<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn NetworkFetcher>,
}

impl<S: CacheStorage> SyncManager<S> {
  pub fn new(storage: Arc<S>, fetcher: Arc<dyn NetworkFetcher>) -> Self {
    Self { storage, fetcher }
  }

  /// Queue a request for the next sync trigger.
  pub fn enqueue(&self, request: &PendingRequest) -> Result<()> {
    let body =
      serde_json::to_vec(request).map_err(|e| eyre!("Failed to serialize pending request: {}", e))?;
    let entry = StoredResponse::new(200)
      .with_header("Content-Type", "application/json")
      .with_body(body);
    self.storage.put(PENDING_STORE, &request.url, &entry)
  }

  /// Replay every queued request, deleting each on success.
  ///
  /// Failed replays stay queued; malformed entries are dropped with a
  /// warning since they could never replay.
  pub async fn flush_pending(&self) -> Result<()> {
    for key in self.storage.keys(PENDING_STORE)? {
      let Some(entry) = self.storage.get(PENDING_STORE, &key)? else {
        continue;
      };

      let request = serde_json::from_slice::<PendingRequest>(&entry.body)
        .map_err(|e| eyre!("{}", e))
        .and_then(PendingRequest::into_fetch);
      let request = match request {
        Ok(request) => request,
        Err(err) => {
          tracing::warn!(key = %key, "dropping malformed pending entry: {}", err);
          let _ = self.storage.delete(PENDING_STORE, &key);
          continue;
        }
      };

      match self.fetcher.fetch(&request).await {
        Ok(response) if response.is_ok() => {
          if let Err(err) = self.storage.delete(PENDING_STORE, &key) {
            tracing::warn!(key = %key, "failed to dequeue synced order: {}", err);
          } else {
            tracing::info!(key = %key, "pending order synced");
          }
        }
        Ok(response) => {
          tracing::warn!(key = %key, status = response.status, "order replay rejected");
        }
        Err(err) => {
          tracing::warn!(key = %key, "failed to sync order: {}", err);
        }
      }
    }

    Ok(())
  }
}

impl<S: CacheStorage> Clone for SyncManager<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
    }
  }
}
