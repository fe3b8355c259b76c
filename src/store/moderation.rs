//! Moderation actions and dashboard statistics for the admin app.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::api::types::{DashboardStats, MessageResponse};
use crate::api::{self, Adapter, ApiError};

use super::{lock_unpoisoned, LoadingGuard};

/// State container for moderator workflows.
///
/// Every action requires a moderator role server-side; a citizen token gets
/// a `Forbidden` back from the adapter.
pub struct ModerationStore<A: Adapter> {
  api: Arc<A>,
  stats: Mutex<Option<DashboardStats>>,
  loading: Arc<AtomicBool>,
}

impl<A: Adapter> ModerationStore<A> {
  pub fn new(api: Arc<A>) -> Self {
    Self {
      api,
      stats: Mutex::new(None),
      loading: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn stats(&self) -> Option<DashboardStats> {
    lock_unpoisoned(&self.stats).clone()
  }

  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::SeqCst)
  }

  /// Approve a pending opinion.
  pub async fn approve(&self, id: u64) -> Result<MessageResponse, ApiError> {
    api::post_json(
      self.api.as_ref(),
      &format!("/admin/opinions/{id}/approve"),
      json!({}),
    )
    .await
  }

  /// Reject a pending opinion with a reason shown to the author.
  pub async fn reject(&self, id: u64, reason: &str) -> Result<MessageResponse, ApiError> {
    api::post_json(
      self.api.as_ref(),
      &format!("/admin/opinions/{id}/reject"),
      json!({ "reason": reason }),
    )
    .await
  }

  /// Merge a duplicate opinion into `target_id`.
  pub async fn merge(&self, id: u64, target_id: u64) -> Result<MessageResponse, ApiError> {
    api::post_json(
      self.api.as_ref(),
      &format!("/admin/opinions/{id}/merge"),
      json!({ "target_id": target_id }),
    )
    .await
  }

  /// Reassign an opinion to another category.
  pub async fn update_category(
    &self,
    id: u64,
    category_id: u64,
  ) -> Result<MessageResponse, ApiError> {
    api::put_json(
      self.api.as_ref(),
      &format!("/admin/opinions/{id}/category"),
      Some(json!({ "category_id": category_id })),
    )
    .await
  }

  /// Remove a comment.
  pub async fn delete_comment(&self, comment_id: u64) -> Result<MessageResponse, ApiError> {
    api::delete_json(self.api.as_ref(), &format!("/admin/comments/{comment_id}")).await
  }

  /// Fetch dashboard counters, replacing the cached copy.
  pub async fn fetch_stats(&self) -> Result<DashboardStats, ApiError> {
    let _guard = LoadingGuard::engage(&self.loading);
    let stats: DashboardStats =
      api::get_json(self.api.as_ref(), "/admin/dashboard/stats", &[]).await?;
    *lock_unpoisoned(&self.stats) = Some(stats.clone());
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Method;
  use crate::store::mock::MockAdapter;

  #[tokio::test]
  async fn test_approve_posts_to_admin_endpoint() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/admin/opinions/5/approve",
      Ok(json!({ "message": "Opinion approved" })),
    );
    let store = ModerationStore::new(Arc::clone(&api));

    let response = store.approve(5).await.expect("approve");

    assert_eq!(response.message, "Opinion approved");
    assert_eq!(api.calls_to(Method::Post, "/admin/opinions/5/approve"), 1);
  }

  #[tokio::test]
  async fn test_reject_carries_reason_in_body() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/admin/opinions/5/reject",
      Ok(json!({ "message": "Opinion rejected" })),
    );
    let store = ModerationStore::new(Arc::clone(&api));

    store.reject(5, "duplicate submission").await.expect("reject");

    let call = api
      .calls()
      .into_iter()
      .find(|c| c.path == "/admin/opinions/5/reject")
      .expect("reject call recorded");
    assert_eq!(call.body, Some(json!({ "reason": "duplicate submission" })));
  }

  #[tokio::test]
  async fn test_merge_carries_target_id() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/admin/opinions/5/merge",
      Ok(json!({ "message": "merged" })),
    );
    let store = ModerationStore::new(Arc::clone(&api));

    store.merge(5, 9).await.expect("merge");

    let call = api
      .calls()
      .into_iter()
      .find(|c| c.path == "/admin/opinions/5/merge")
      .expect("merge call recorded");
    assert_eq!(call.body, Some(json!({ "target_id": 9 })));
  }

  #[tokio::test]
  async fn test_forbidden_propagates_to_caller() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Post,
      "/admin/opinions/5/approve",
      Err(ApiError::Forbidden("moderators only".to_string())),
    );
    let store = ModerationStore::new(api);

    let result = store.approve(5).await;

    assert_eq!(result.err(), Some(ApiError::Forbidden("moderators only".to_string())));
  }

  #[tokio::test]
  async fn test_fetch_stats_caches_counters() {
    let api = Arc::new(MockAdapter::new());
    api.stub(
      Method::Get,
      "/admin/dashboard/stats",
      Ok(json!({ "total_opinions": 40, "pending_opinions": 3 })),
    );
    let store = ModerationStore::new(api);

    let stats = store.fetch_stats().await.expect("stats");

    assert_eq!(stats.total_opinions, 40);
    assert_eq!(stats.pending_opinions, 3);
    assert_eq!(store.stats(), Some(stats));
    assert!(!store.is_loading());
  }
}
