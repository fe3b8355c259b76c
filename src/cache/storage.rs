//! Cache storage trait with SQLite and in-memory implementations.
//!
//! Entries are keyed by (generation, request URL). Generations are named
//! namespaces tied to a worker version; invalidation happens by deleting a
//! whole generation, never entry-by-entry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};

/// A cached HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub status: u16,
  pub content_type: String,
  pub body: Vec<u8>,
}

impl CachedResponse {
  /// Whether this response may be stored by the cache-first policy.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A stored response plus its storage timestamp.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: CachedResponse,
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store a response under `generation` for the exact request URL,
  /// replacing any previous entry.
  fn put(&self, generation: &str, url: &str, response: &CachedResponse) -> Result<()>;

  /// Look up the response cached for the exact request URL.
  fn get(&self, generation: &str, url: &str) -> Result<Option<CachedEntry>>;

  /// List every generation name present in storage.
  fn generations(&self) -> Result<Vec<String>>;

  /// Delete a whole generation and all of its entries.
  fn delete_generation(&self, generation: &str) -> Result<()>;
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    generation TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, url)
);

CREATE INDEX IF NOT EXISTS idx_response_cache_generation
    ON response_cache(generation);
"#;

/// SQLite-backed cache storage.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::init(conn)
  }

  /// Open an in-memory cache database (used by tests).
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::init(conn)
  }

  fn init(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("agora").join("cache.db"))
  }
}

impl CacheStorage for SqliteCacheStorage {
  fn put(&self, generation: &str, url: &str, response: &CachedResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (generation, url, status, content_type, body, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))",
        params![generation, url, response.status, response.content_type, response.body],
      )
      .map_err(|e| eyre!("Failed to store cached response: {}", e))?;

    Ok(())
  }

  fn get(&self, generation: &str, url: &str) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, body, cached_at FROM response_cache
         WHERE generation = ? AND url = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, String)> = stmt
      .query_row(params![generation, url], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match row {
      Some((status, content_type, body, cached_at)) => Ok(Some(CachedEntry {
        response: CachedResponse {
          status,
          content_type,
          body,
        },
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT generation FROM response_cache")
      .map_err(|e| eyre!("Failed to prepare generation listing: {}", e))?;

    let generations: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list generations: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(generations)
  }

  fn delete_generation(&self, generation: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM response_cache WHERE generation = ?",
        params![generation],
      )
      .map_err(|e| eyre!("Failed to delete cache generation: {}", e))?;

    Ok(())
  }
}

/// In-memory cache storage for tests.
#[derive(Default)]
pub struct MemoryCacheStorage {
  entries: Mutex<HashMap<(String, String), CachedEntry>>,
}

impl MemoryCacheStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryCacheStorage {
  fn put(&self, generation: &str, url: &str, response: &CachedResponse) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    entries.insert(
      (generation.to_string(), url.to_string()),
      CachedEntry {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );

    Ok(())
  }

  fn get(&self, generation: &str, url: &str) -> Result<Option<CachedEntry>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(entries.get(&(generation.to_string(), url.to_string())).cloned())
  }

  fn generations(&self) -> Result<Vec<String>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut generations: Vec<String> = entries.keys().map(|(g, _)| g.clone()).collect();
    generations.sort();
    generations.dedup();
    Ok(generations)
  }

  fn delete_generation(&self, generation: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    entries.retain(|(g, _), _| g != generation);
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
