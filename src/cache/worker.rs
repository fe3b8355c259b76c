//! Offline cache worker: lifecycle, fetch interception, and push relay.
//!
//! The worker runs in its own task and talks to its clients only through
//! structured messages and the shared cache storage; there is no shared
//! mutable memory with the rest of the application.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::storage::{CacheStorage, CachedResponse};
use super::strategy::{self, RequestClass, Served};

/// Shell assets fetched into the precache generation at install time.
pub const PRECACHE_MANIFEST: &[&str] = &[
  "/",
  "/index.html",
  "/manifest.json",
  "/icons/icon-192x192.png",
  "/icons/icon-512x512.png",
];

pub const NOTIFICATION_TITLE: &str = "Agora civic portal";
pub const NOTIFICATION_FALLBACK_BODY: &str = "You have a new notification";
pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Installing,
  Waiting,
  Active,
}

/// Control messages from the page to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
  /// Force a pending update to activate immediately.
  SkipWaiting,
  /// Fetch and store the given URLs in the runtime generation.
  CacheUrls { urls: Vec<String> },
}

/// Everything the worker reacts to while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
  Message(WorkerMessage),
  Push { payload: Option<String> },
  NotificationClick { action: String },
}

/// A notification relayed to the client for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
  pub title: String,
  pub body: String,
  pub actions: Vec<String>,
}

/// Commands the worker issues back to its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
  /// Display a notification.
  ShowNotification(PushNotification),
  /// Open or focus a client window at the given path.
  OpenWindow(String),
}

/// Outcome of intercepting one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// The worker served the request.
  Response(Served),
  /// Cross-origin: the caller performs its default handling.
  Bypass,
}

/// Network transport used by the worker to reach the origin server.
#[async_trait]
pub trait WorkerFetch: Send + Sync {
  /// Fetch `url` (absolute, or a path resolved against the portal origin).
  async fn fetch(&self, url: &str) -> Result<CachedResponse>;
}

/// Production transport over reqwest.
pub struct ReqwestFetch {
  http: reqwest::Client,
  origin: Url,
}

impl ReqwestFetch {
  pub fn new(origin: Url, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to build worker HTTP client: {}", e))?;

    Ok(Self { http, origin })
  }
}

#[async_trait]
impl WorkerFetch for ReqwestFetch {
  async fn fetch(&self, url: &str) -> Result<CachedResponse> {
    let absolute = if url.starts_with("http://") || url.starts_with("https://") {
      Url::parse(url).map_err(|e| eyre!("Invalid request URL {}: {}", url, e))?
    } else {
      self
        .origin
        .join(url)
        .map_err(|e| eyre!("Invalid request path {}: {}", url, e))?
    };

    let response = self
      .http
      .get(absolute)
      .send()
      .await
      .map_err(|e| eyre!("Network error fetching {}: {}", url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("application/octet-stream")
      .to_string();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?
      .to_vec();

    Ok(CachedResponse {
      status,
      content_type,
      body,
    })
  }
}

/// The offline cache worker.
///
/// Lifecycle: `installing -> waiting -> active`, with an aggressive update
/// policy; a new version activates without waiting for existing clients to
/// close, and activation purges every generation that is not one of the two
/// live names, so no entry outlives two version transitions.
pub struct CacheWorker<S: CacheStorage, F: WorkerFetch> {
  storage: Arc<S>,
  fetch: F,
  origin: Url,
  api_prefix: String,
  version: u32,
  state: WorkerState,
  clients: mpsc::UnboundedSender<ClientCommand>,
}

impl<S: CacheStorage, F: WorkerFetch> CacheWorker<S, F> {
  pub fn new(
    storage: Arc<S>,
    fetch: F,
    origin: Url,
    api_prefix: String,
    version: u32,
    clients: mpsc::UnboundedSender<ClientCommand>,
  ) -> Self {
    Self {
      storage,
      fetch,
      origin,
      api_prefix,
      version,
      state: WorkerState::Installing,
      clients,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn precache_generation(&self) -> String {
    format!("agora-precache-v{}", self.version)
  }

  pub fn runtime_generation(&self) -> String {
    format!("agora-runtime-v{}", self.version)
  }

  /// Install: fetch the app shell into the versioned precache generation.
  ///
  /// Any failed manifest fetch fails the install and the worker never
  /// reaches waiting.
  pub async fn install(&mut self) -> Result<()> {
    info!(version = self.version, "installing cache worker");
    let generation = self.precache_generation();

    for url in PRECACHE_MANIFEST {
      let response = self.fetch.fetch(url).await?;
      self.storage.put(&generation, url, &response)?;
    }

    self.state = WorkerState::Waiting;
    Ok(())
  }

  /// Activate: purge every generation not belonging to this version, then
  /// take control of clients.
  pub fn activate(&mut self) -> Result<()> {
    let live = [self.precache_generation(), self.runtime_generation()];

    for generation in self.storage.generations()? {
      if !live.contains(&generation) {
        info!(%generation, "deleting stale cache generation");
        self.storage.delete_generation(&generation)?;
      }
    }

    self.state = WorkerState::Active;
    info!(version = self.version, "cache worker active");
    Ok(())
  }

  /// Intercept one fetch.
  ///
  /// Cross-origin requests bypass the worker entirely; same-origin traffic
  /// is served network-first (API) or cache-first (static assets).
  pub async fn handle_fetch(&self, request_url: &str) -> Result<FetchOutcome> {
    let class = strategy::classify(request_url, &self.origin, &self.api_prefix);
    debug!(%request_url, ?class, "intercepted fetch");

    if class == RequestClass::CrossOrigin {
      return Ok(FetchOutcome::Bypass);
    }

    let key = cache_key(request_url)?;
    let runtime = self.runtime_generation();
    let precache = self.precache_generation();
    let lookups = [runtime.as_str(), precache.as_str()];

    let served = match class {
      RequestClass::Api => {
        strategy::network_first(self.storage.as_ref(), &runtime, &lookups, &key, || {
          self.fetch.fetch(request_url)
        })
        .await?
      }
      _ => {
        strategy::cache_first(self.storage.as_ref(), &runtime, &lookups, &key, || {
          self.fetch.fetch(request_url)
        })
        .await?
      }
    };

    Ok(FetchOutcome::Response(served))
  }

  /// Handle one control message from the page.
  pub async fn handle_message(&mut self, message: WorkerMessage) -> Result<()> {
    match message {
      WorkerMessage::SkipWaiting => {
        if self.state == WorkerState::Waiting {
          self.activate()?;
        } else {
          debug!(state = ?self.state, "skip-waiting ignored");
        }
      }
      WorkerMessage::CacheUrls { urls } => {
        let generation = self.runtime_generation();
        for url in &urls {
          let response = self.fetch.fetch(url).await?;
          self.storage.put(&generation, url, &response)?;
        }
      }
    }
    Ok(())
  }

  /// Relay a push event as a displayed notification, with a static body
  /// fallback when the payload is empty.
  pub fn handle_push(&self, payload: Option<String>) {
    let body = payload.unwrap_or_else(|| NOTIFICATION_FALLBACK_BODY.to_string());
    let notification = PushNotification {
      title: NOTIFICATION_TITLE.to_string(),
      body,
      actions: vec![ACTION_EXPLORE.to_string(), ACTION_CLOSE.to_string()],
    };

    if self
      .clients
      .send(ClientCommand::ShowNotification(notification))
      .is_err()
    {
      warn!("no client listening for push notifications");
    }
  }

  /// Handle a click on a displayed notification: only the explore action
  /// opens a window.
  pub fn handle_notification_click(&self, action: &str) {
    if action == ACTION_EXPLORE {
      let _ = self.clients.send(ClientCommand::OpenWindow("/".to_string()));
    }
  }

  /// Run the worker lifecycle: install, activate immediately, then serve
  /// events until the channel closes.
  pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WorkerEvent>) -> Result<()> {
    self.install().await?;
    // Aggressive update policy: no waiting for existing clients to close.
    self.activate()?;

    while let Some(event) = events.recv().await {
      match event {
        WorkerEvent::Message(message) => {
          if let Err(e) = self.handle_message(message).await {
            warn!("worker message failed: {e}");
          }
        }
        WorkerEvent::Push { payload } => self.handle_push(payload),
        WorkerEvent::NotificationClick { action } => self.handle_notification_click(&action),
      }
    }

    Ok(())
  }
}

/// Cache key for a same-origin request: path plus query.
///
/// Precache manifest entries are plain paths; keying intercepted requests
/// the same way makes the two halves of the cache agree on identity.
fn cache_key(request_url: &str) -> Result<String> {
  let url =
    Url::parse(request_url).map_err(|e| eyre!("Invalid request URL {}: {}", request_url, e))?;

  Ok(match url.query() {
    Some(query) => format!("{}?{}", url.path(), query),
    None => url.path().to_string(),
  })
}
