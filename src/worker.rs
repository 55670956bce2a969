//! The offline worker: one event-driven dispatcher tying together
//! lifecycle, routing, sync, push, and client messaging.

use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::cache::{CacheNames, CacheStorage};
use crate::clients::{ClientHub, NotificationSink};
use crate::config::Config;
use crate::event::{WorkerEvent, WorkerHandle};
use crate::http::{FetchRequest, StoredResponse};
use crate::lifecycle::Lifecycle;
use crate::message::{ControlMessage, APP_DATA_KEY, APP_DATA_STORE};
use crate::net::NetworkFetcher;
use crate::push::notification_from_payload;
use crate::router::RequestRouter;
use crate::routes::RouteTable;
use crate::sync::{SyncManager, SYNC_TAG};

/// The worker. Owns no threads of its own: it reacts to delivered events,
/// suspending only at network and storage boundaries. Concurrent fetches
/// for distinct URLs proceed independently on spawned tasks.
pub struct OfflineWorker<S: CacheStorage + 'static> {
  config: Config,
  names: CacheNames,
  storage: Arc<S>,
  fetcher: Arc<dyn NetworkFetcher>,
  hub: Arc<dyn ClientHub>,
  notifications: Arc<dyn NotificationSink>,
  router: RequestRouter<S>,
  lifecycle: Lifecycle<S>,
  sync: SyncManager<S>,
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl<S: CacheStorage + 'static> OfflineWorker<S> {
  pub fn new(
    config: Config,
    storage: S,
    fetcher: Arc<dyn NetworkFetcher>,
    hub: Arc<dyn ClientHub>,
    notifications: Arc<dyn NotificationSink>,
  ) -> Result<Self> {
    let storage = Arc::new(storage);
    let names = CacheNames::new(&config.cache_prefix, &config.version);
    let table = RouteTable::from_config(&config.api_routes, &config.dynamic_routes)?;

    let router = RequestRouter::new(
      &config,
      names.clone(),
      table.clone(),
      Arc::clone(&storage),
      Arc::clone(&fetcher),
    );
    let lifecycle = Lifecycle::new(
      &config,
      names.clone(),
      &table,
      Arc::clone(&storage),
      Arc::clone(&fetcher),
      Arc::clone(&hub),
    )?;
    let sync = SyncManager::new(Arc::clone(&storage), Arc::clone(&fetcher));

    let (tx, rx) = mpsc::unbounded_channel();

    Ok(Self {
      config,
      names,
      storage,
      fetcher,
      hub,
      notifications,
      router,
      lifecycle,
      sync,
      rx,
      tx,
    })
  }

  /// Handle for delivering events to this worker.
  pub fn handle(&self) -> WorkerHandle {
    WorkerHandle::new(self.tx.clone())
  }

  pub fn lifecycle(&self) -> &Lifecycle<S> {
    &self.lifecycle
  }

  pub fn sync_manager(&self) -> &SyncManager<S> {
    &self.sync
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Run install + activate, then dispatch events until every handle is
  /// dropped.
  pub async fn run(mut self) -> Result<()> {
    self.lifecycle.install().await?;
    self.lifecycle.activate().await?;

    while let Some(event) = self.rx.recv().await {
      self.handle_event(event).await;
    }

    Ok(())
  }

  /// Dispatch events without running the install/activate lifecycle first,
  /// for hosts resuming over already-populated stores.
  pub async fn run_dispatcher(mut self) -> Result<()> {
    while let Some(event) = self.rx.recv().await {
      self.handle_event(event).await;
    }

    Ok(())
  }

  async fn handle_event(&mut self, event: WorkerEvent) {
    match event {
      WorkerEvent::Fetch { request, reply } => {
        // Independent per-request task so one slow fetch never holds up
        // the dispatcher
        let router = self.router.clone();
        tokio::spawn(async move {
          let _ = reply.send(router.route(&request).await);
        });
      }
      WorkerEvent::Sync { tag } if tag == SYNC_TAG => {
        // Replays run on their own task so a long flush never delays
        // dispatch of later events
        let sync = self.sync.clone();
        tokio::spawn(async move {
          if let Err(err) = sync.flush_pending().await {
            tracing::warn!("pending-order sync failed: {}", err);
          }
        });
      }
      WorkerEvent::Sync { tag } => {
        tracing::debug!(tag = %tag, "ignoring unknown sync tag");
      }
      WorkerEvent::Push { payload } => {
        let notification =
          notification_from_payload(payload.as_deref(), &self.config.notifications);
        if let Err(err) = self.notifications.show(&notification).await {
          tracing::warn!("failed to display notification: {}", err);
        }
      }
      WorkerEvent::NotificationClick { url } => {
        if let Err(err) = self.notifications.dismiss().await {
          tracing::warn!("failed to dismiss notification: {}", err);
        }
        if let Err(err) = self.hub.focus_or_open(&url).await {
          tracing::warn!(url = %url, "failed to open window: {}", err);
        }
      }
      WorkerEvent::Message { message, reply } => {
        self.handle_message(message, reply).await;
      }
    }
  }

  async fn handle_message(
    &self,
    message: ControlMessage,
    reply: Option<oneshot::Sender<Option<serde_json::Value>>>,
  ) {
    match message {
      ControlMessage::SkipWaiting => {
        // Force-activate-now: rerun the activation sweep and takeover
        if let Err(err) = self.lifecycle.activate().await {
          tracing::warn!("forced activation failed: {}", err);
        }
      }
      ControlMessage::UpdateCache { url } => {
        if let Err(err) = self.update_cache(&url).await {
          tracing::warn!(url = %url, "cache update failed: {}", err);
        }
      }
      ControlMessage::CacheData { data } => {
        let entry = StoredResponse::json(&data);
        if let Err(err) = self.storage.put(APP_DATA_STORE, APP_DATA_KEY, &entry) {
          tracing::warn!("failed to store app data: {}", err);
        }
      }
      ControlMessage::GetCachedData => {
        if let Some(reply) = reply {
          let _ = reply.send(self.cached_data());
        }
      }
    }
  }

  /// Fetch a single URL and add it to the shell store.
  async fn update_cache(&self, url: &str) -> Result<()> {
    let resolved: Url = self.config.origin_url()?.join(url)?;
    let request = FetchRequest::get(resolved);
    let response = self.fetcher.fetch(&request).await?;
    self
      .storage
      .put(&self.names.shell, &request.cache_key(), &response)
  }

  fn cached_data(&self) -> Option<serde_json::Value> {
    let entry = self
      .storage
      .get(APP_DATA_STORE, APP_DATA_KEY)
      .ok()
      .flatten()?;
    serde_json::from_slice(&entry.body).ok()
  }
}
