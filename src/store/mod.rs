//! Per-entity state containers mirroring server responses.
//!
//! Each store owns an in-memory cache of fetched records, pagination
//! metadata, and a loading flag. Stores are generic over the
//! [`Adapter`](crate::api::Adapter) seam so tests drive them with a
//! scripted transport instead of the network.

pub mod media;
pub mod moderation;
pub mod notification;
pub mod opinion;
pub mod user;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A fetched collection plus the server-reported total.
///
/// `items.len()` and `total` may transiently disagree: total reflects the
/// last server-reported count, items the last page fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection<T> {
  pub items: Vec<T>,
  pub total: u64,
}

/// Lock a store mutex, recovering the data from a poisoned lock.
///
/// Store state is plain data; a panicking writer cannot leave it in a state
/// worse than a lost update, so readers keep going.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears a shared loading flag on every exit path.
///
/// Holding the guard across a fetch keeps the flag true for the duration of
/// the call and false after it returns, whether the call succeeded or bailed
/// out early with `?`.
pub(crate) struct LoadingGuard {
  flag: Arc<AtomicBool>,
}

impl LoadingGuard {
  pub(crate) fn engage(flag: &Arc<AtomicBool>) -> Self {
    flag.store(true, Ordering::SeqCst);
    Self {
      flag: Arc::clone(flag),
    }
  }
}

impl Drop for LoadingGuard {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::SeqCst);
  }
}

/// Monotonic sequence of fetch tokens for one resource.
///
/// Superseded fetches race, and without sequencing the last response to
/// resolve would win regardless of request order. A completed fetch
/// publishes its result only when its token is still the latest issued.
#[derive(Debug, Default)]
pub struct FetchSequence {
  latest: AtomicU64,
}

impl FetchSequence {
  /// Issue the next token, superseding all earlier ones.
  pub fn begin(&self) -> u64 {
    self.latest.fetch_add(1, Ordering::SeqCst) + 1
  }

  /// Whether `token` is still the latest issued.
  pub fn is_current(&self, token: u64) -> bool {
    self.latest.load(Ordering::SeqCst) == token
  }
}

#[cfg(test)]
pub(crate) mod mock {
  //! Scripted transport for store tests: canned responses per (method, path).

  use std::collections::{HashMap, VecDeque};
  use std::sync::Mutex;

  use async_trait::async_trait;
  use serde_json::Value;
  use tokio::sync::Notify;

  use crate::api::{Adapter, ApiError, FilePart, Method};

  type Stubbed = Result<Value, ApiError>;

  #[derive(Debug, Clone)]
  pub(crate) struct RecordedCall {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
  }

  #[derive(Default)]
  pub(crate) struct MockAdapter {
    responses: Mutex<HashMap<(Method, String), VecDeque<Stubbed>>>,
    gates: Mutex<HashMap<String, std::sync::Arc<Notify>>>,
    calls: Mutex<Vec<RecordedCall>>,
  }

  impl MockAdapter {
    pub(crate) fn new() -> Self {
      Self::default()
    }

    /// Replace the canned response for (method, path).
    pub(crate) fn stub(&self, method: Method, path: &str, response: Stubbed) {
      let mut responses = self.responses.lock().unwrap();
      responses.insert((method, path.to_string()), VecDeque::from([response]));
    }

    /// Queue an additional response behind the current one. Responses pop
    /// in order; the final one repeats.
    pub(crate) fn enqueue(&self, method: Method, path: &str, response: Stubbed) {
      let mut responses = self.responses.lock().unwrap();
      responses
        .entry((method, path.to_string()))
        .or_default()
        .push_back(response);
    }

    /// Make the next call to `path` wait until the returned handle is
    /// notified, so tests can interleave racing fetches deterministically.
    pub(crate) fn gate(&self, path: &str) -> std::sync::Arc<Notify> {
      let notify = std::sync::Arc::new(Notify::new());
      self
        .gates
        .lock()
        .unwrap()
        .insert(path.to_string(), std::sync::Arc::clone(&notify));
      notify
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
      self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, method: Method, path: &str) -> usize {
      self
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.method == method && c.path == path)
        .count()
    }

    fn take_response(&self, method: Method, path: &str) -> Stubbed {
      let mut responses = self.responses.lock().unwrap();
      match responses.get_mut(&(method, path.to_string())) {
        Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| {
          Err(ApiError::NotFound(format!("no stub for {path}")))
        }),
        Some(queue) => queue
          .front()
          .cloned()
          .unwrap_or_else(|| Err(ApiError::NotFound(format!("no stub for {path}")))),
        None => Err(ApiError::NotFound(format!("no stub for {path}"))),
      }
    }
  }

  #[async_trait]
  impl Adapter for MockAdapter {
    async fn send(
      &self,
      method: Method,
      path: &str,
      body: Option<Value>,
      _params: &[(String, String)],
    ) -> Result<Value, ApiError> {
      self.calls.lock().unwrap().push(RecordedCall {
        method,
        path: path.to_string(),
        body,
      });

      let gate = self.gates.lock().unwrap().remove(path);
      let response = self.take_response(method, path);
      if let Some(gate) = gate {
        gate.notified().await;
      }
      response
    }

    async fn send_multipart(&self, path: &str, parts: Vec<FilePart>) -> Result<Value, ApiError> {
      self.calls.lock().unwrap().push(RecordedCall {
        method: Method::Post,
        path: path.to_string(),
        body: Some(Value::from(parts.len() as u64)),
      });
      self.take_response(Method::Post, path)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_loading_guard_clears_flag_on_drop() {
    let flag = Arc::new(AtomicBool::new(false));
    {
      let _guard = LoadingGuard::engage(&flag);
      assert!(flag.load(Ordering::SeqCst));
    }
    assert!(!flag.load(Ordering::SeqCst));
  }

  #[test]
  fn test_loading_guard_clears_flag_on_early_return() {
    fn failing(flag: &Arc<AtomicBool>) -> Result<(), ()> {
      let _guard = LoadingGuard::engage(flag);
      Err(())?;
      Ok(())
    }

    let flag = Arc::new(AtomicBool::new(false));
    assert!(failing(&flag).is_err());
    assert!(!flag.load(Ordering::SeqCst));
  }

  #[test]
  fn test_fetch_sequence_supersedes_older_tokens() {
    let seq = FetchSequence::default();
    let first = seq.begin();
    assert!(seq.is_current(first));

    let second = seq.begin();
    assert!(!seq.is_current(first));
    assert!(seq.is_current(second));
  }
}
