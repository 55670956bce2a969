//! Push payload parsing.

use serde::Deserialize;

use crate::clients::Notification;
use crate::config::NotificationConfig;

/// JSON payload carried by a push event. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub url: Option<String>,
}

/// Build a displayable notification from a raw push payload, filling in
/// defaults for anything absent or unparseable.
pub fn notification_from_payload(
  payload: Option<&[u8]>,
  config: &NotificationConfig,
) -> Notification {
  let data: PushPayload = payload
    .and_then(|bytes| serde_json::from_slice(bytes).ok())
    .unwrap_or_default();

  Notification {
    title: data.title.unwrap_or_else(|| "New notification".to_string()),
    body: data
      .body
      .unwrap_or_else(|| "You have a new message".to_string()),
    icon: config.icon.clone(),
    badge: config.badge.clone(),
    url: data.url.unwrap_or_else(|| "/".to_string()),
  }
}
