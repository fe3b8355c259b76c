//! Notification store with resilient background polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::try_join_all;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::api::types::Notification;
use crate::api::{self, Adapter, ApiError, Method};

use super::{lock_unpoisoned, LoadingGuard};

#[derive(Debug, Clone, Default)]
struct NotificationState {
  items: Vec<Notification>,
  unread: u64,
}

/// State container for user notifications.
///
/// Fetching is deliberately lossy on failure: background polling resets to
/// an empty collection instead of propagating, so it can never crash the
/// caller.
pub struct NotificationStore<A: Adapter> {
  api: Arc<A>,
  state: Mutex<NotificationState>,
  loading: Arc<AtomicBool>,
  poller: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Adapter + 'static> NotificationStore<A> {
  pub fn new(api: Arc<A>) -> Self {
    Self {
      api,
      state: Mutex::new(NotificationState::default()),
      loading: Arc::new(AtomicBool::new(false)),
      poller: Mutex::new(None),
    }
  }

  pub fn notifications(&self) -> Vec<Notification> {
    lock_unpoisoned(&self.state).items.clone()
  }

  pub fn unread_count(&self) -> u64 {
    lock_unpoisoned(&self.state).unread
  }

  pub fn has_unread(&self) -> bool {
    self.unread_count() > 0
  }

  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::SeqCst)
  }

  /// Fetch notifications, replacing the collection wholesale.
  ///
  /// Errors are swallowed: the collection resets to empty and the call
  /// reports nothing, matching the needs of background polling.
  pub async fn fetch_notifications(&self, unread_only: bool) {
    let _guard = LoadingGuard::engage(&self.loading);

    let mut params = Vec::new();
    if unread_only {
      params.push(("unread_only".to_string(), "true".to_string()));
    }

    let result: Result<Vec<Notification>, ApiError> =
      api::get_json(self.api.as_ref(), "/notifications", &params).await;

    let mut state = lock_unpoisoned(&self.state);
    match result {
      Ok(items) => {
        let unread = items.iter().filter(|n| !n.is_read).count() as u64;
        *state = NotificationState { items, unread };
      }
      Err(e) => {
        warn!("failed to fetch notifications: {e}");
        *state = NotificationState::default();
      }
    }
  }

  /// Mark one notification as read, patching the local record in place.
  pub async fn mark_read(&self, id: u64) -> Result<(), ApiError> {
    let _: serde_json::Value = self
      .api
      .send(Method::Put, &format!("/notifications/{id}/read"), None, &[])
      .await?;

    let mut state = lock_unpoisoned(&self.state);
    if let Some(notification) = state.items.iter_mut().find(|n| n.id == id) {
      if !notification.is_read {
        notification.is_read = true;
        state.unread = state.unread.saturating_sub(1);
      }
    }

    Ok(())
  }

  /// Mark every unread notification as read with a concurrent fan-out.
  pub async fn mark_all_read(&self) -> Result<(), ApiError> {
    let unread_ids: Vec<u64> = {
      let state = lock_unpoisoned(&self.state);
      state
        .items
        .iter()
        .filter(|n| !n.is_read)
        .map(|n| n.id)
        .collect()
    };

    try_join_all(unread_ids.into_iter().map(|id| {
      let api = Arc::clone(&self.api);
      async move {
        api
          .send(Method::Put, &format!("/notifications/{id}/read"), None, &[])
          .await
      }
    }))
    .await?;

    let mut state = lock_unpoisoned(&self.state);
    for notification in &mut state.items {
      notification.is_read = true;
    }
    state.unread = 0;

    Ok(())
  }

  /// Start background polling, replacing any previous poller.
  ///
  /// The first poll happens one interval from now, then repeats until
  /// [`Self::stop_polling`] or [`Self::clear`].
  pub fn start_polling(self: Arc<Self>, every: Duration) {
    let store = Arc::clone(&self);
    let mut poller = lock_unpoisoned(&self.poller);

    if let Some(handle) = poller.take() {
      handle.abort();
    }

    *poller = Some(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      // The first tick of an interval fires immediately; consume it so the
      // cadence starts one interval out.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        store.fetch_notifications(false).await;
      }
    }));
  }

  /// Stop background polling if it is running.
  pub fn stop_polling(&self) {
    let mut poller = lock_unpoisoned(&self.poller);
    if let Some(handle) = poller.take() {
      handle.abort();
    }
  }

  /// Drop all notification state and stop polling.
  pub fn clear(&self) {
    *lock_unpoisoned(&self.state) = NotificationState::default();
    self.stop_polling();
  }
}

impl<A: Adapter> Drop for NotificationStore<A> {
  fn drop(&mut self) {
    let mut poller = lock_unpoisoned(&self.poller);
    if let Some(handle) = poller.take() {
      handle.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::mock::MockAdapter;
  use serde_json::json;

  fn notification_json(id: u64, is_read: bool) -> serde_json::Value {
    json!({ "id": id, "title": format!("Notification {id}"), "is_read": is_read })
  }

  #[tokio::test]
  async fn test_fetch_sets_items_and_unread_count() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Get,
      "/notifications",
      Ok(json!([
        notification_json(1, false),
        notification_json(2, true),
        notification_json(3, false),
      ])),
    );
    let store = NotificationStore::new(api);

    store.fetch_notifications(false).await;

    assert_eq!(store.notifications().len(), 3);
    assert_eq!(store.unread_count(), 2);
    assert!(store.has_unread());
    assert!(!store.is_loading());
  }

  #[tokio::test]
  async fn test_fetch_failure_resets_to_empty_without_propagating() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Get,
      "/notifications",
      Ok(json!([notification_json(1, false)])),
    );
    let store = NotificationStore::new(Arc::clone(&api));
    store.fetch_notifications(false).await;
    assert_eq!(store.notifications().len(), 1);

    api.stub(
      Method::Get,
      "/notifications",
      Err(ApiError::Network("connection refused".to_string())),
    );
    store.fetch_notifications(false).await;

    assert!(store.notifications().is_empty());
    assert_eq!(store.unread_count(), 0);
    assert!(!store.is_loading());
  }

  #[tokio::test]
  async fn test_non_array_response_degrades_to_empty() {
    let api = Arc::new(MockAdapter::new());
    api.stub(Method::Get, "/notifications", Ok(json!({ "unexpected": true })));
    let store = NotificationStore::new(api);

    store.fetch_notifications(false).await;

    assert!(store.notifications().is_empty());
  }

  #[tokio::test]
  async fn test_mark_read_patches_record_and_unread_count() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Get,
      "/notifications",
      Ok(json!([notification_json(1, false), notification_json(2, false)])),
    );
    api.stub(Method::Put, "/notifications/1/read", Ok(json!({ "message": "ok" })));
    let store = NotificationStore::new(api);
    store.fetch_notifications(false).await;

    store.mark_read(1).await.expect("mark read");

    let items = store.notifications();
    assert!(items.iter().find(|n| n.id == 1).map(|n| n.is_read).unwrap_or(false));
    assert_eq!(store.unread_count(), 1);
  }

  #[tokio::test]
  async fn test_mark_read_twice_does_not_underflow_unread() {
    let api = Arc::new(MockAdapter::new());
    api.stub(Method::Get, "/notifications", Ok(json!([notification_json(1, false)])));
    api.stub(Method::Put, "/notifications/1/read", Ok(json!({ "message": "ok" })));
    let store = NotificationStore::new(api);
    store.fetch_notifications(false).await;

    store.mark_read(1).await.expect("first");
    store.mark_read(1).await.expect("second");

    assert_eq!(store.unread_count(), 0);
  }

  #[tokio::test]
  async fn test_mark_all_read_fans_out_per_unread() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Get,
      "/notifications",
      Ok(json!([
        notification_json(1, false),
        notification_json(2, true),
        notification_json(3, false),
      ])),
    );
    api.stub(Method::Put, "/notifications/1/read", Ok(json!({})));
    api.stub(Method::Put, "/notifications/3/read", Ok(json!({})));
    let store = NotificationStore::new(Arc::clone(&api));
    store.fetch_notifications(false).await;

    store.mark_all_read().await.expect("mark all");

    assert_eq!(store.unread_count(), 0);
    assert!(store.notifications().iter().all(|n| n.is_read));
    assert_eq!(api.calls_to(Method::Put, "/notifications/1/read"), 1);
    assert_eq!(api.calls_to(Method::Put, "/notifications/3/read"), 1);
    // Already-read notifications are not re-sent.
    assert_eq!(api.calls_to(Method::Put, "/notifications/2/read"), 0);
  }

  #[tokio::test]
  async fn test_clear_empties_state() {
    let api = Arc::new(MockAdapter::new());
    api.stub(Method::Get, "/notifications", Ok(json!([notification_json(1, false)])));
    let store = NotificationStore::new(api);
    store.fetch_notifications(false).await;

    store.clear();

    assert!(store.notifications().is_empty());
    assert_eq!(store.unread_count(), 0);
  }

  #[tokio::test]
  async fn test_polling_refreshes_on_interval() {
    let api = Arc::new(MockAdapter::new());
    api.stub(Method::Get, "/notifications", Ok(json!([notification_json(1, false)])));
    let store = Arc::new(NotificationStore::new(Arc::clone(&api)));

    Arc::clone(&store).start_polling(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(35)).await;
    store.stop_polling();

    assert!(api.calls_to(Method::Get, "/notifications") >= 1);
    assert_eq!(store.notifications().len(), 1);
  }
}
