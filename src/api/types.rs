//! Serde-deserializable types matching the opinions API responses.
//!
//! These mirror the server payloads field-for-field; absent optional fields
//! default so a sparse server response still deserializes cleanly.

use serde::{Deserialize, Serialize};

/// Paged collection envelope used by list endpoints.
///
/// `items` and `total` both default when the server omits them: an empty
/// page rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page<T> {
  #[serde(default)]
  pub items: Vec<T>,
  #[serde(default)]
  pub total: u64,
}

/// An authenticated user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub username: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub full_name: Option<String>,
  #[serde(default = "default_role")]
  pub role: String,
}

fn default_role() -> String {
  "citizen".to_string()
}

/// Response of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default)]
  pub token_type: String,
  #[serde(default)]
  pub user: Option<User>,
}

// ============================================================================
// Opinions
// ============================================================================

/// A single civic opinion as returned by the opinions endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Opinion {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub category_id: Option<u64>,
  #[serde(default)]
  pub category_name: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub region: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub view_count: u64,
  #[serde(default)]
  pub comment_count: u64,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

/// Vote tally for one opinion, from `GET /opinions/{id}/votes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoteStats {
  #[serde(default)]
  pub like_count: u64,
  #[serde(default)]
  pub support_count: u64,
}

/// Bookmark state for one opinion, from `GET /opinions/{id}/collect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookmarkStatus {
  #[serde(default)]
  pub is_collected: bool,
}

/// The two vote kinds the portal offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
  Like,
  Support,
}

/// A comment attached to an opinion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Comment {
  pub id: u64,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub created_at: String,
}

/// An opinion category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
  pub id: u64,
  pub name: String,
}

/// Response of `GET /categories`; tolerates an absent list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryList {
  #[serde(default)]
  pub categories: Vec<Category>,
}

// ============================================================================
// Notifications
// ============================================================================

/// A user notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
  pub id: u64,
  #[serde(default)]
  pub opinion_id: Option<u64>,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub content: Option<String>,
  #[serde(default)]
  pub is_read: bool,
  #[serde(default)]
  pub created_at: String,
}

// ============================================================================
// Media
// ============================================================================

/// Metadata for one uploaded media file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaUpload {
  pub filename: String,
  #[serde(default)]
  pub media_type: String,
  #[serde(default)]
  pub file_size: u64,
  #[serde(default)]
  pub mime_type: Option<String>,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub thumbnail_url: Option<String>,
}

/// Response of `POST /media/upload-multiple`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadBatch {
  #[serde(default)]
  pub uploaded: u64,
  #[serde(default)]
  pub failed: u64,
  #[serde(default)]
  pub files: Vec<serde_json::Value>,
}

// ============================================================================
// Admin
// ============================================================================

/// Dashboard counters for the admin landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardStats {
  #[serde(default)]
  pub total_opinions: u64,
  #[serde(default)]
  pub pending_opinions: u64,
  #[serde(default)]
  pub approved_opinions: u64,
  #[serde(default)]
  pub rejected_opinions: u64,
  #[serde(default)]
  pub total_users: u64,
}

/// Generic acknowledgement envelope for mutating endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
  #[serde(default)]
  pub message: String,
}
