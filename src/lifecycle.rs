//! Install and activate lifecycle for versioned cache stores.

use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use url::Url;

use crate::cache::{CacheNames, CacheStorage};
use crate::clients::{ClientBroadcast, ClientHub};
use crate::config::Config;
use crate::http::{FetchRequest, StoredResponse};
use crate::net::NetworkFetcher;
use crate::routes::RouteTable;

/// Manages install-time precaching and activation cleanup.
pub struct Lifecycle<S: CacheStorage> {
  storage: Arc<S>,
  fetcher: Arc<dyn NetworkFetcher>,
  hub: Arc<dyn ClientHub>,
  names: CacheNames,
  version: String,
  origin: Url,
  precache_assets: Vec<String>,
  offline_assets: Vec<String>,
}

impl<S: CacheStorage> Lifecycle<S> {
  pub fn new(
    config: &Config,
    names: CacheNames,
    table: &RouteTable,
    storage: Arc<S>,
    fetcher: Arc<dyn NetworkFetcher>,
    hub: Arc<dyn ClientHub>,
  ) -> Result<Self> {
    Ok(Self {
      storage,
      fetcher,
      hub,
      names,
      version: config.version.clone(),
      origin: config.origin_url()?,
      precache_assets: config.precache_assets.clone(),
      offline_assets: table.dynamic_assets().map(String::from).collect(),
    })
  }

  /// Populate the shell store with the precache asset list and the offline
  /// store with every dynamic route's substitute content.
  ///
  /// All-or-nothing: a single failed asset fetch fails the whole install
  /// and leaves the stores unwritten. Readiness is immediate; there is no
  /// graceful handoff to wait on.
  pub async fn install(&self) -> Result<()> {
    let shell = try_join_all(
      self
        .precache_assets
        .iter()
        .map(|asset| self.fetch_asset(asset)),
    )
    .await?;

    let offline = try_join_all(
      self
        .offline_assets
        .iter()
        .map(|asset| self.fetch_asset(asset)),
    )
    .await?;

    for (asset, response) in self.precache_assets.iter().zip(shell) {
      self.storage.put(&self.names.shell, asset, &response)?;
    }
    for (asset, response) in self.offline_assets.iter().zip(offline) {
      self.storage.put(&self.names.offline, asset, &response)?;
    }

    tracing::info!(version = %self.version, "service worker installed");
    Ok(())
  }

  async fn fetch_asset(&self, asset: &str) -> Result<StoredResponse> {
    let url = self
      .origin
      .join(asset)
      .map_err(|e| eyre!("Invalid asset URL '{}': {}", asset, e))?;

    let response = self.fetcher.fetch(&FetchRequest::get(url)).await?;
    if !response.is_ok() {
      return Err(eyre!(
        "Precache fetch for {} returned status {}",
        asset,
        response.status
      ));
    }

    Ok(response)
  }

  /// Sweep stores left behind by older versions, claim open pages, and
  /// tell every connected client which version just took over.
  pub async fn activate(&self) -> Result<()> {
    let existing = self.storage.store_names()?;
    for stale in sweep_targets(&existing, &self.names) {
      tracing::info!(store = %stale, "deleting old cache");
      self.storage.delete_store(&stale)?;
    }

    self.hub.claim().await?;
    tracing::info!(version = %self.version, "service worker activated");

    self
      .hub
      .broadcast(&ClientBroadcast::Activated {
        version: self.version.clone(),
      })
      .await?;

    Ok(())
  }
}

/// Store names that belong to this application but not to the current
/// version. Stores without our prefix are never touched.
fn sweep_targets(existing: &[String], names: &CacheNames) -> Vec<String> {
  existing
    .iter()
    .filter(|name| name.starts_with(names.prefix()) && !names.is_current(name))
    .cloned()
    .collect()
}
