//! Typed failures surfaced by the HTTP adapter.

use serde_json::Value;

/// Errors produced by API calls, classified by transport outcome.
///
/// Every call is attempt-once: there is no retry logic anywhere, so each
/// kind describes the final outcome of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  /// The server rejected our credentials (401). Handled globally: the
  /// session is torn down before this is surfaced to the caller.
  #[error("session expired, please log in again")]
  AuthExpired,
  /// The server refused the operation (403).
  #[error("forbidden: {0}")]
  Forbidden(String),
  /// The requested resource does not exist (404).
  #[error("not found: {0}")]
  NotFound(String),
  /// The server failed (500).
  #[error("server error: {0}")]
  Server(String),
  /// Any other 4xx, carrying the server-supplied message.
  #[error("request rejected ({status}): {message}")]
  Rejected { status: u16, message: String },
  /// No response arrived: connection failure or timeout.
  #[error("network unavailable: {0}")]
  Network(String),
  /// The response arrived but did not match the expected shape.
  #[error("unexpected response shape: {0}")]
  Decode(String),
}

impl ApiError {
  /// Classify an HTTP error status plus its parsed body.
  ///
  /// Servers report failures with a JSON `detail` field; when it is absent
  /// each kind falls back to a generic message.
  pub fn from_status(status: u16, body: &Value) -> Self {
    let detail = detail_message(body);
    match status {
      401 => Self::AuthExpired,
      403 => Self::Forbidden(detail.unwrap_or_else(|| "no permission for this operation".to_string())),
      404 => Self::NotFound(detail.unwrap_or_else(|| "requested resource does not exist".to_string())),
      500 => Self::Server(detail.unwrap_or_else(|| "internal server error".to_string())),
      status => Self::Rejected {
        status,
        message: detail.unwrap_or_else(|| "operation failed".to_string()),
      },
    }
  }

  /// Whether this error indicates an expired session.
  pub fn is_auth_expired(&self) -> bool {
    matches!(self, Self::AuthExpired)
  }
}

/// Extract the server-supplied `detail` message, if any.
fn detail_message(body: &Value) -> Option<String> {
  body.get("detail").and_then(Value::as_str).map(String::from)
}
