//! Shared test fixtures: scripted network, recording host fakes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::clients::{ClientBroadcast, ClientHub, Notification, NotificationSink};
use crate::http::{FetchRequest, StoredResponse};
use crate::net::NetworkFetcher;
use crate::strategy::stamp_cache_date;

pub(crate) const TEST_ORIGIN: &str = "https://pos.example";

pub(crate) fn url(path: &str) -> Url {
  Url::parse(TEST_ORIGIN)
    .unwrap()
    .join(path)
    .unwrap()
}

pub(crate) fn get(path: &str) -> FetchRequest {
  FetchRequest::get(url(path))
}

pub(crate) fn response(body: &str) -> StoredResponse {
  StoredResponse::new(200).with_body(body)
}

/// A 200 response stamped as retrieved `age_secs` seconds ago.
pub(crate) fn stamped_response(body: &str, age_secs: i64) -> StoredResponse {
  stamp_cache_date(response(body), Utc::now() - Duration::seconds(age_secs))
}

enum FakeOutcome {
  Respond(StoredResponse),
  Fail,
}

/// Scripted network fetcher that records every call.
///
/// Outcomes are keyed by request path; unscripted paths get the default
/// outcome (a 200 echoing the path, or a failure for `offline()`).
pub(crate) struct FakeNetwork {
  outcomes: Mutex<HashMap<String, FakeOutcome>>,
  fail_by_default: bool,
  calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self {
      outcomes: Mutex::new(HashMap::new()),
      fail_by_default: false,
      calls: Mutex::new(Vec::new()),
    }
  }

  /// A network where every unscripted request fails.
  pub fn offline() -> Self {
    Self {
      fail_by_default: true,
      ..Self::new()
    }
  }

  pub fn respond(&self, path: &str, response: StoredResponse) {
    self
      .outcomes
      .lock()
      .unwrap()
      .insert(path.to_string(), FakeOutcome::Respond(response));
  }

  pub fn fail(&self, path: &str) {
    self
      .outcomes
      .lock()
      .unwrap()
      .insert(path.to_string(), FakeOutcome::Fail);
  }

  pub fn calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn calls_for(&self, path: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|called| called.as_str() == path)
      .count()
  }
}

#[async_trait]
impl NetworkFetcher for FakeNetwork {
  async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
    let path = request.url.path().to_string();
    self.calls.lock().unwrap().push(path.clone());

    let outcomes = self.outcomes.lock().unwrap();
    match outcomes.get(&path) {
      Some(FakeOutcome::Respond(response)) => Ok(response.clone()),
      Some(FakeOutcome::Fail) => Err(eyre!("network unreachable: {}", path)),
      None if self.fail_by_default => Err(eyre!("network unreachable: {}", path)),
      None => Ok(response(&path)),
    }
  }
}

/// Client hub that records claims, broadcasts, and opened windows.
#[derive(Default)]
pub(crate) struct RecordingHub {
  pub claims: Mutex<usize>,
  pub broadcasts: Mutex<Vec<ClientBroadcast>>,
  pub opened: Mutex<Vec<String>>,
}

#[async_trait]
impl ClientHub for RecordingHub {
  async fn claim(&self) -> Result<()> {
    *self.claims.lock().unwrap() += 1;
    Ok(())
  }

  async fn broadcast(&self, message: &ClientBroadcast) -> Result<()> {
    self.broadcasts.lock().unwrap().push(message.clone());
    Ok(())
  }

  async fn focus_or_open(&self, url: &str) -> Result<()> {
    self.opened.lock().unwrap().push(url.to_string());
    Ok(())
  }
}

/// Notification sink that records what was shown and dismissed.
#[derive(Default)]
pub(crate) struct RecordingNotifications {
  pub shown: Mutex<Vec<Notification>>,
  pub dismissed: Mutex<usize>,
}

#[async_trait]
impl NotificationSink for RecordingNotifications {
  async fn show(&self, notification: &Notification) -> Result<()> {
    self.shown.lock().unwrap().push(notification.clone());
    Ok(())
  }

  async fn dismiss(&self) -> Result<()> {
    *self.dismissed.lock().unwrap() += 1;
    Ok(())
  }
}
