//! HTTP adapter boundary between the resource stores and the network.
//!
//! Stores never talk to the transport directly: they go through the
//! [`Adapter`] trait, so tests can substitute a scripted mock while the
//! application wires in [`client::HttpAdapter`].

pub mod client;
pub mod error;
pub mod types;

pub use client::HttpAdapter;
pub use error::ApiError;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// HTTP method subset used by the opinions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

/// One file in a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
  /// Form field name (`file` for single uploads, `files` for batches)
  pub field: String,
  pub filename: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

/// Transport seam between stores and the HTTP client.
#[async_trait]
pub trait Adapter: Send + Sync {
  /// Send a request and return the unwrapped response payload.
  async fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    params: &[(String, String)],
  ) -> Result<Value, ApiError>;

  /// Send a multipart upload.
  async fn send_multipart(&self, path: &str, parts: Vec<FilePart>) -> Result<Value, ApiError>;
}

/// GET `path` and deserialize the payload.
pub async fn get_json<A, T>(api: &A, path: &str, params: &[(String, String)]) -> Result<T, ApiError>
where
  A: Adapter + ?Sized,
  T: DeserializeOwned,
{
  decode(api.send(Method::Get, path, None, params).await?)
}

/// POST `body` to `path` and deserialize the payload.
pub async fn post_json<A, T>(api: &A, path: &str, body: Value) -> Result<T, ApiError>
where
  A: Adapter + ?Sized,
  T: DeserializeOwned,
{
  decode(api.send(Method::Post, path, Some(body), &[]).await?)
}

/// PUT `body` to `path` and deserialize the payload.
pub async fn put_json<A, T>(api: &A, path: &str, body: Option<Value>) -> Result<T, ApiError>
where
  A: Adapter + ?Sized,
  T: DeserializeOwned,
{
  decode(api.send(Method::Put, path, body, &[]).await?)
}

/// DELETE `path` and deserialize the payload.
pub async fn delete_json<A, T>(api: &A, path: &str) -> Result<T, ApiError>
where
  A: Adapter + ?Sized,
  T: DeserializeOwned,
{
  decode(api.send(Method::Delete, path, None, &[]).await?)
}

/// Upload `parts` to `path` and deserialize the payload.
pub async fn upload_json<A, T>(api: &A, path: &str, parts: Vec<FilePart>) -> Result<T, ApiError>
where
  A: Adapter + ?Sized,
  T: DeserializeOwned,
{
  decode(api.send_multipart(path, parts).await?)
}

/// Convert an unwrapped payload into a typed value.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}
