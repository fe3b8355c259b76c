//! Production HTTP adapter over reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::session::SessionContext;

use super::error::ApiError;
use super::{Adapter, FilePart, Method};

/// HTTP client adapter for the opinions API.
///
/// Attaches bearer credentials from the session, unwraps response payloads,
/// and maps failures into [`ApiError`]. A 401 from any call tears down the
/// session globally; callers cannot opt out.
#[derive(Clone)]
pub struct HttpAdapter {
  http: reqwest::Client,
  base_url: String,
  session: Arc<SessionContext>,
}

impl HttpAdapter {
  /// Build an adapter against the configured API origin.
  pub fn new(config: &ApiConfig, session: Arc<SessionContext>) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      session,
    })
  }

  fn request_url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Apply the global 401 policy to a settled call.
  fn observe(&self, result: Result<Value, ApiError>) -> Result<Value, ApiError> {
    if matches!(result, Err(ApiError::AuthExpired)) {
      warn!("received 401, tearing down session");
      self.session.expire();
    }
    result
  }

  async fn dispatch(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    params: &[(String, String)],
  ) -> Result<Value, ApiError> {
    let url = self.request_url(path);
    let mut request = match method {
      Method::Get => self.http.get(&url),
      Method::Post => self.http.post(&url),
      Method::Put => self.http.put(&url),
      Method::Delete => self.http.delete(&url),
    };

    if !params.is_empty() {
      request = request.query(params);
    }
    if let Some(token) = self.session.token() {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;

    Self::unwrap_response(response).await
  }

  /// Unwrap the payload envelope: success bodies come back as parsed JSON,
  /// failures as classified [`ApiError`]s carrying the server message.
  async fn unwrap_response(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();

    if status.is_success() {
      let text = response
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
      if text.is_empty() {
        return Ok(Value::Null);
      }
      return serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()));
    }

    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    Err(ApiError::from_status(status.as_u16(), &body))
  }
}

#[async_trait]
impl Adapter for HttpAdapter {
  async fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    params: &[(String, String)],
  ) -> Result<Value, ApiError> {
    debug!(?method, %path, "api request");
    let result = self.dispatch(method, path, body, params).await;
    self.observe(result)
  }

  async fn send_multipart(&self, path: &str, parts: Vec<FilePart>) -> Result<Value, ApiError> {
    debug!(%path, count = parts.len(), "multipart upload");

    let mut form = reqwest::multipart::Form::new();
    for part in parts {
      let file = reqwest::multipart::Part::bytes(part.bytes)
        .file_name(part.filename)
        .mime_str(&part.content_type)
        .map_err(|e| ApiError::Decode(format!("invalid content type: {e}")))?;
      form = form.part(part.field, file);
    }

    let mut request = self.http.post(self.request_url(path)).multipart(form);
    if let Some(token) = self.session.token() {
      request = request.bearer_auth(token);
    }

    let result = match request.send().await {
      Ok(response) => Self::unwrap_response(response).await,
      Err(e) => Err(ApiError::Network(e.to_string())),
    };
    self.observe(result)
  }
}
