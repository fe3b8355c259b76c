//! Opinion store: list, composite detail, votes, bookmarks, and comments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use crate::api::types::{
  BookmarkStatus, Category, CategoryList, Comment, MessageResponse, Opinion, Page, VoteKind,
  VoteStats,
};
use crate::api::{self, Adapter, ApiError};

use super::{lock_unpoisoned, Collection, FetchSequence, LoadingGuard};

/// Composite opinion detail joined from three endpoints.
///
/// Only as fresh as the last join; it is published whole or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct OpinionDetail {
  pub opinion: Opinion,
  pub upvotes: u64,
  pub downvotes: u64,
  pub is_bookmarked: bool,
}

/// Filter parameters for the opinion list.
#[derive(Debug, Clone, Default)]
pub struct OpinionFilter {
  pub page: Option<u64>,
  pub page_size: Option<u64>,
  pub category_id: Option<u64>,
  pub status: Option<String>,
}

impl OpinionFilter {
  fn to_params(&self) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(page) = self.page {
      params.push(("page".to_string(), page.to_string()));
    }
    if let Some(page_size) = self.page_size {
      params.push(("page_size".to_string(), page_size.to_string()));
    }
    if let Some(category_id) = self.category_id {
      params.push(("category_id".to_string(), category_id.to_string()));
    }
    if let Some(status) = &self.status {
      params.push(("status".to_string(), status.clone()));
    }
    params
  }
}

/// State container for opinion data fetched from the API.
pub struct OpinionStore<A: Adapter> {
  api: Arc<A>,
  opinions: Mutex<Collection<Opinion>>,
  my_opinions: Mutex<Collection<Opinion>>,
  current: Mutex<Option<OpinionDetail>>,
  categories: Mutex<Vec<Category>>,
  loading: Arc<AtomicBool>,
  list_seq: FetchSequence,
  my_seq: FetchSequence,
  detail_seq: FetchSequence,
}

impl<A: Adapter> OpinionStore<A> {
  pub fn new(api: Arc<A>) -> Self {
    Self {
      api,
      opinions: Mutex::new(Collection::default()),
      my_opinions: Mutex::new(Collection::default()),
      current: Mutex::new(None),
      categories: Mutex::new(Vec::new()),
      loading: Arc::new(AtomicBool::new(false)),
      list_seq: FetchSequence::default(),
      my_seq: FetchSequence::default(),
      detail_seq: FetchSequence::default(),
    }
  }

  pub fn opinions(&self) -> Collection<Opinion> {
    lock_unpoisoned(&self.opinions).clone()
  }

  pub fn my_opinions(&self) -> Collection<Opinion> {
    lock_unpoisoned(&self.my_opinions).clone()
  }

  pub fn current(&self) -> Option<OpinionDetail> {
    lock_unpoisoned(&self.current).clone()
  }

  pub fn categories(&self) -> Vec<Category> {
    lock_unpoisoned(&self.categories).clone()
  }

  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::SeqCst)
  }

  /// Fetch the opinion list, replacing items and total wholesale.
  ///
  /// On failure the previous items stay untouched (stale but valid); the
  /// loading flag clears on every exit path.
  pub async fn fetch_opinions(&self, filter: &OpinionFilter) -> Result<Page<Opinion>, ApiError> {
    let token = self.list_seq.begin();
    let _guard = LoadingGuard::engage(&self.loading);

    let page: Page<Opinion> =
      api::get_json(self.api.as_ref(), "/opinions", &filter.to_params()).await?;

    if self.list_seq.is_current(token) {
      *lock_unpoisoned(&self.opinions) = Collection {
        items: page.items.clone(),
        total: page.total,
      };
    } else {
      debug!(token, "discarding superseded opinion list fetch");
    }

    Ok(page)
  }

  /// Fetch opinions authored by the current user, optionally filtered by
  /// moderation status.
  pub async fn fetch_my_opinions(
    &self,
    page: u64,
    page_size: u64,
    status: Option<&str>,
  ) -> Result<Page<Opinion>, ApiError> {
    let token = self.my_seq.begin();
    let _guard = LoadingGuard::engage(&self.loading);

    let mut params = vec![
      ("page".to_string(), page.to_string()),
      ("page_size".to_string(), page_size.to_string()),
    ];
    if let Some(status) = status {
      params.push(("status".to_string(), status.to_string()));
    }

    let result: Page<Opinion> = api::get_json(self.api.as_ref(), "/opinions/my", &params).await?;

    if self.my_seq.is_current(token) {
      *lock_unpoisoned(&self.my_opinions) = Collection {
        items: result.items.clone(),
        total: result.total,
      };
    }

    Ok(result)
  }

  /// Fetch one opinion plus its vote tally and bookmark flag concurrently.
  ///
  /// All three requests must succeed before the composite is published; a
  /// failed sub-fetch aborts the whole operation.
  pub async fn fetch_opinion(&self, id: u64) -> Result<OpinionDetail, ApiError> {
    let token = self.detail_seq.begin();
    let _guard = LoadingGuard::engage(&self.loading);

    let opinion_path = format!("/opinions/{id}");
    let votes_path = format!("/opinions/{id}/votes");
    let collect_path = format!("/opinions/{id}/collect");
    let (opinion, votes, bookmark): (Opinion, VoteStats, BookmarkStatus) = tokio::try_join!(
      api::get_json(self.api.as_ref(), &opinion_path, &[]),
      api::get_json(self.api.as_ref(), &votes_path, &[]),
      api::get_json(self.api.as_ref(), &collect_path, &[]),
    )?;

    let detail = OpinionDetail {
      opinion,
      upvotes: votes.like_count,
      downvotes: votes.support_count,
      is_bookmarked: bookmark.is_collected,
    };

    if self.detail_seq.is_current(token) {
      *lock_unpoisoned(&self.current) = Some(detail.clone());
    } else {
      debug!(token, id, "discarding superseded opinion detail fetch");
    }

    Ok(detail)
  }

  /// Submit a new opinion.
  pub async fn create_opinion(
    &self,
    title: &str,
    content: &str,
    category_id: Option<u64>,
  ) -> Result<Opinion, ApiError> {
    let mut body = json!({ "title": title, "content": content });
    if let Some(category_id) = category_id {
      body["category_id"] = json!(category_id);
    }
    api::post_json(self.api.as_ref(), "/opinions", body).await
  }

  /// Cast a vote, then re-fetch the opinion.
  ///
  /// The mutation result is discarded: the returned detail is a fresh
  /// server read, not a client-side guess.
  pub async fn vote(&self, id: u64, kind: VoteKind) -> Result<OpinionDetail, ApiError> {
    let _: MessageResponse = api::post_json(
      self.api.as_ref(),
      &format!("/opinions/{id}/vote"),
      json!({ "vote_type": kind }),
    )
    .await?;

    self.fetch_opinion(id).await
  }

  /// Bookmark an opinion, then re-fetch it for authoritative state.
  pub async fn bookmark(&self, id: u64) -> Result<OpinionDetail, ApiError> {
    let _: MessageResponse =
      api::post_json(self.api.as_ref(), &format!("/opinions/{id}/collect"), json!({})).await?;

    self.fetch_opinion(id).await
  }

  /// Remove a bookmark, then re-fetch. Redundant removals are not an error.
  pub async fn unbookmark(&self, id: u64) -> Result<OpinionDetail, ApiError> {
    let _: MessageResponse =
      api::delete_json(self.api.as_ref(), &format!("/opinions/{id}/collect")).await?;

    self.fetch_opinion(id).await
  }

  /// Fetch comments for an opinion.
  pub async fn fetch_comments(&self, id: u64, page: Option<u64>) -> Result<Page<Comment>, ApiError> {
    let mut params = Vec::new();
    if let Some(page) = page {
      params.push(("page".to_string(), page.to_string()));
    }
    api::get_json(self.api.as_ref(), &format!("/opinions/{id}/comments"), &params).await
  }

  /// Add a comment to an opinion.
  pub async fn add_comment(&self, id: u64, content: &str) -> Result<Comment, ApiError> {
    api::post_json(
      self.api.as_ref(),
      &format!("/opinions/{id}/comments"),
      json!({ "content": content }),
    )
    .await
  }

  /// Fetch the category list, replacing the cached one wholesale.
  pub async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
    let list: CategoryList = api::get_json(self.api.as_ref(), "/categories", &[]).await?;
    *lock_unpoisoned(&self.categories) = list.categories.clone();
    Ok(list.categories)
  }
}
