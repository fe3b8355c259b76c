//! Authenticated-identity state shared by the adapter, stores, and guard.
//!
//! The session context is injected explicitly into every component that
//! needs it; "session expired" is delivered through a broadcast channel
//! rather than ambient reach-through, so any number of subscribers (router,
//! views) can react to a teardown triggered deep inside the adapter.

use std::path::PathBuf;
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::types::User;

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

/// A live authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub token: String,
  pub user: Option<User>,
}

/// Events published when session state changes out from under its owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
  /// The server rejected our credentials; subscribers should route to login.
  Expired,
}

/// Durable key-value persistence for session state.
///
/// Two entries (`token`, `user`) survive across runs and are cleared
/// together on logout or auth failure.
pub struct SessionStore {
  conn: Mutex<Connection>,
}

const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SessionStore {
  /// Open the session store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open session store at {}: {}", path.display(), e))?;

    Self::init(conn)
  }

  /// Open an in-memory store (used by tests).
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory session store: {}", e))?;

    Self::init(conn)
  }

  fn init(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("agora").join("session.db"))
  }

  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM session_kv WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare session lookup: {}", e))?;

    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();
    Ok(value)
  }

  fn put(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO session_kv (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store session entry: {}", e))?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM session_kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete session entry: {}", e))?;

    Ok(())
  }
}

/// Session context injected into the adapter, stores, and navigation guard.
pub struct SessionContext {
  store: SessionStore,
  current: Mutex<Option<Session>>,
  events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
  /// Load persisted session state, if any.
  pub fn load(store: SessionStore) -> Result<Self> {
    let token = store.get(TOKEN_KEY)?;
    // A stale user payload from an older version is treated as absent.
    let user = match store.get(USER_KEY)? {
      Some(raw) => serde_json::from_str(&raw).ok(),
      None => None,
    };

    let current = token.map(|token| Session { token, user });
    let (events, _) = broadcast::channel(8);

    Ok(Self {
      store,
      current: Mutex::new(current),
      events,
    })
  }

  /// Subscribe to session lifecycle events.
  pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
    self.events.subscribe()
  }

  /// Token presence is the definition of the authenticated state.
  pub fn is_logged_in(&self) -> bool {
    self.token().is_some()
  }

  /// The current bearer token, if authenticated.
  pub fn token(&self) -> Option<String> {
    let current = self.current.lock().ok()?;
    current.as_ref().map(|s| s.token.clone())
  }

  /// The cached user profile, if known.
  pub fn user(&self) -> Option<User> {
    let current = self.current.lock().ok()?;
    current.as_ref().and_then(|s| s.user.clone())
  }

  /// Install a new session and persist it.
  pub fn establish(&self, token: String, user: Option<User>) -> Result<()> {
    self.store.put(TOKEN_KEY, &token)?;
    match &user {
      Some(user) => {
        let raw = serde_json::to_string(user)
          .map_err(|e| eyre!("Failed to serialize user profile: {}", e))?;
        self.store.put(USER_KEY, &raw)?;
      }
      None => self.store.delete(USER_KEY)?,
    }

    let mut current = self
      .current
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *current = Some(Session { token, user });

    info!("session established");
    Ok(())
  }

  /// Replace the cached user profile, keeping the token.
  pub fn update_user(&self, user: User) -> Result<()> {
    let raw =
      serde_json::to_string(&user).map_err(|e| eyre!("Failed to serialize user profile: {}", e))?;
    self.store.put(USER_KEY, &raw)?;

    let mut current = self
      .current
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some(session) = current.as_mut() {
      session.user = Some(user);
    }

    Ok(())
  }

  /// Clear the session without notifying subscribers (explicit logout).
  pub fn clear(&self) -> Result<()> {
    self.store.delete(TOKEN_KEY)?;
    self.store.delete(USER_KEY)?;

    let mut current = self
      .current
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *current = None;

    Ok(())
  }

  /// Tear down the session after an auth failure and notify subscribers.
  ///
  /// One broadcast per call: every failing request issues exactly one
  /// redirect signal.
  pub fn expire(&self) {
    if let Err(e) = self.clear() {
      warn!("failed to clear persisted session: {e}");
    }
    // No subscribers is fine; the CLI reacts to the returned error instead.
    let _ = self.events.send(SessionEvent::Expired);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn context() -> SessionContext {
    let store = SessionStore::open_in_memory().expect("open store");
    SessionContext::load(store).expect("load context")
  }

  fn user() -> User {
    User {
      id: 42,
      username: "citizen_kane".to_string(),
      email: "kane@example.org".to_string(),
      full_name: None,
      role: "citizen".to_string(),
    }
  }

  #[test]
  fn test_establish_sets_token_and_user() {
    let ctx = context();
    assert!(!ctx.is_logged_in());

    ctx
      .establish("tok-123".to_string(), Some(user()))
      .expect("establish");

    assert!(ctx.is_logged_in());
    assert_eq!(ctx.token().as_deref(), Some("tok-123"));
    assert_eq!(ctx.user().map(|u| u.username), Some("citizen_kane".to_string()));
  }

  #[test]
  fn test_session_survives_reload_from_same_store() {
    let store = SessionStore::open_in_memory().expect("open store");
    store.put(TOKEN_KEY, "tok-456").expect("put token");
    store
      .put(USER_KEY, &serde_json::to_string(&user()).expect("json"))
      .expect("put user");

    let ctx = SessionContext::load(store).expect("load context");
    assert_eq!(ctx.token().as_deref(), Some("tok-456"));
    assert_eq!(ctx.user().map(|u| u.id), Some(42));
  }

  #[test]
  fn test_corrupt_persisted_user_is_treated_as_absent() {
    let store = SessionStore::open_in_memory().expect("open store");
    store.put(TOKEN_KEY, "tok-789").expect("put token");
    store.put(USER_KEY, "{not json").expect("put user");

    let ctx = SessionContext::load(store).expect("load context");
    assert!(ctx.is_logged_in());
    assert!(ctx.user().is_none());
  }

  #[test]
  fn test_clear_removes_token_and_user() {
    let ctx = context();
    ctx
      .establish("tok-123".to_string(), Some(user()))
      .expect("establish");

    ctx.clear().expect("clear");

    assert!(!ctx.is_logged_in());
    assert!(ctx.token().is_none());
    assert!(ctx.user().is_none());
  }

  #[test]
  fn test_expire_clears_session_and_broadcasts_once() {
    let ctx = context();
    ctx
      .establish("tok-123".to_string(), Some(user()))
      .expect("establish");
    let mut events = ctx.subscribe();

    ctx.expire();

    assert!(!ctx.is_logged_in());
    assert!(matches!(events.try_recv(), Ok(SessionEvent::Expired)));
    // Exactly one signal per failing call.
    assert!(events.try_recv().is_err());
  }

  #[test]
  fn test_expire_without_subscribers_does_not_panic() {
    let ctx = context();
    ctx.establish("tok-123".to_string(), None).expect("establish");
    ctx.expire();
    assert!(!ctx.is_logged_in());
  }
}
