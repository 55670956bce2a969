//! Host boundaries for connected pages and system notifications.
//!
//! The browser gives a worker `clients` and `registration.showNotification`;
//! this crate gets the same capabilities through traits so hosts and tests
//! can decide what "a window" means.

use async_trait::async_trait;
use color_eyre::Result;
use serde::Serialize;

/// Structured message posted from the worker to every connected page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientBroadcast {
  #[serde(rename = "SW_ACTIVATED")]
  Activated { version: String },
}

/// Connected pages: claiming control, broadcasting, and window focus.
#[async_trait]
pub trait ClientHub: Send + Sync {
  /// Take control of already-open pages immediately, without a reload.
  async fn claim(&self) -> Result<()>;

  /// Post a structured message to every connected page.
  async fn broadcast(&self, message: &ClientBroadcast) -> Result<()>;

  /// Focus an existing window at `url`, or open a new one.
  async fn focus_or_open(&self, url: &str) -> Result<()>;
}

/// A system notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  /// Target URL opened when the user activates the notification.
  pub url: String,
}

/// Display surface for push notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn show(&self, notification: &Notification) -> Result<()>;

  /// Dismiss the currently displayed notification.
  async fn dismiss(&self) -> Result<()>;
}

/// Hub for hosts without real windows: everything is logged and dropped.
pub struct LoggingHub;

#[async_trait]
impl ClientHub for LoggingHub {
  async fn claim(&self) -> Result<()> {
    tracing::debug!("claiming clients");
    Ok(())
  }

  async fn broadcast(&self, message: &ClientBroadcast) -> Result<()> {
    tracing::info!(?message, "broadcast to clients");
    Ok(())
  }

  async fn focus_or_open(&self, url: &str) -> Result<()> {
    tracing::info!(url, "focus or open window");
    Ok(())
  }
}

/// Notification sink for hosts without a display surface.
pub struct LoggingNotifications;

#[async_trait]
impl NotificationSink for LoggingNotifications {
  async fn show(&self, notification: &Notification) -> Result<()> {
    tracing::info!(
      title = %notification.title,
      body = %notification.body,
      url = %notification.url,
      "notification"
    );
    Ok(())
  }

  async fn dismiss(&self) -> Result<()> {
    Ok(())
  }
}
