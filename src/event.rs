//! Worker events and the handle used to deliver them.

use color_eyre::{eyre::eyre, Result};
use tokio::sync::{mpsc, oneshot};

use crate::http::FetchRequest;
use crate::message::ControlMessage;
use crate::router::RouteOutcome;

/// Events delivered to the worker's dispatcher.
#[derive(Debug)]
pub enum WorkerEvent {
  /// An intercepted request; the routed outcome goes back on `reply`.
  Fetch {
    request: FetchRequest,
    reply: oneshot::Sender<Result<RouteOutcome>>,
  },
  /// A background sync trigger.
  Sync { tag: String },
  /// A push event with its raw payload, if any.
  Push { payload: Option<Vec<u8>> },
  /// The user activated a displayed notification.
  NotificationClick { url: String },
  /// A control message from a page, with an optional reply channel for
  /// messages that answer back.
  Message {
    message: ControlMessage,
    reply: Option<oneshot::Sender<Option<serde_json::Value>>>,
  },
}

/// Cloneable handle for delivering events to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
  pub(crate) fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
    Self { tx }
  }

  /// Route a request through the worker and wait for its outcome.
  pub async fn fetch(&self, request: FetchRequest) -> Result<RouteOutcome> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerEvent::Fetch { request, reply })
      .map_err(|_| eyre!("Worker stopped"))?;
    rx.await.map_err(|_| eyre!("Worker dropped the request"))?
  }

  pub fn sync(&self, tag: &str) -> Result<()> {
    self
      .tx
      .send(WorkerEvent::Sync {
        tag: tag.to_string(),
      })
      .map_err(|_| eyre!("Worker stopped"))
  }

  pub fn push(&self, payload: Option<Vec<u8>>) -> Result<()> {
    self
      .tx
      .send(WorkerEvent::Push { payload })
      .map_err(|_| eyre!("Worker stopped"))
  }

  pub fn notification_click(&self, url: &str) -> Result<()> {
    self
      .tx
      .send(WorkerEvent::NotificationClick {
        url: url.to_string(),
      })
      .map_err(|_| eyre!("Worker stopped"))
  }

  /// Deliver a control message that expects no reply.
  pub fn message(&self, message: ControlMessage) -> Result<()> {
    self
      .tx
      .send(WorkerEvent::Message {
        message,
        reply: None,
      })
      .map_err(|_| eyre!("Worker stopped"))
  }

  /// Ask the worker for the page-supplied cached payload.
  pub async fn cached_data(&self) -> Result<Option<serde_json::Value>> {
    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(WorkerEvent::Message {
        message: ControlMessage::GetCachedData,
        reply: Some(reply),
      })
      .map_err(|_| eyre!("Worker stopped"))?;
    rx.await.map_err(|_| eyre!("Worker dropped the request"))
  }
}
