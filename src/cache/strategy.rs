//! Request classification and the two fetch strategies.
//!
//! The worker picks a strategy from the request class alone: API traffic is
//! network-first, static assets are cache-first, and anything cross-origin
//! bypasses interception entirely.

use std::future::Future;

use color_eyre::Result;
use tracing::{info, warn};
use url::Url;

use super::storage::{CacheStorage, CachedResponse};

/// How an intercepted request should be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Same-origin API call: network-first.
  Api,
  /// Same-origin static asset: cache-first.
  StaticAsset,
  /// Different origin (or unparseable): pass through untouched.
  CrossOrigin,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Network,
  Cache,
}

/// A response plus the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
  pub response: CachedResponse,
  pub from: ServedFrom,
}

/// Classify a request URL against the portal origin and API prefix.
pub fn classify(request_url: &str, portal_origin: &Url, api_prefix: &str) -> RequestClass {
  let url = match Url::parse(request_url) {
    Ok(url) => url,
    Err(_) => return RequestClass::CrossOrigin,
  };

  if url.origin() != portal_origin.origin() {
    return RequestClass::CrossOrigin;
  }

  if url.path().starts_with(api_prefix) {
    RequestClass::Api
  } else {
    RequestClass::StaticAsset
  }
}

/// Network-first: attempt the network, store a copy on success, fall back to
/// the cached response for the exact URL when the network fails.
///
/// The cache write is best-effort; a storage failure never fails the fetch.
/// When both network and cache miss, the original network error surfaces.
pub async fn network_first<S, F, Fut>(
  storage: &S,
  runtime_generation: &str,
  lookup_generations: &[&str],
  url: &str,
  fetcher: F,
) -> Result<Served>
where
  S: CacheStorage + ?Sized,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<CachedResponse>>,
{
  match fetcher().await {
    Ok(response) => {
      if let Err(e) = storage.put(runtime_generation, url, &response) {
        warn!("failed to cache response for {url}: {e}");
      }
      Ok(Served {
        response,
        from: ServedFrom::Network,
      })
    }
    Err(network_err) => {
      for generation in lookup_generations {
        match storage.get(generation, url) {
          Ok(Some(entry)) => {
            info!(%url, cached_at = %entry.cached_at, "network failed, serving cached response");
            return Ok(Served {
              response: entry.response,
              from: ServedFrom::Cache,
            });
          }
          Ok(None) => {}
          Err(e) => warn!("cache lookup failed for {url}: {e}"),
        }
      }
      Err(network_err)
    }
  }
}

/// Cache-first: return a cached match when present, otherwise fetch and
/// store a copy, caching only successful responses.
pub async fn cache_first<S, F, Fut>(
  storage: &S,
  runtime_generation: &str,
  lookup_generations: &[&str],
  url: &str,
  fetcher: F,
) -> Result<Served>
where
  S: CacheStorage + ?Sized,
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<CachedResponse>>,
{
  for generation in lookup_generations {
    match storage.get(generation, url) {
      Ok(Some(entry)) => {
        return Ok(Served {
          response: entry.response,
          from: ServedFrom::Cache,
        });
      }
      Ok(None) => {}
      Err(e) => warn!("cache lookup failed for {url}: {e}"),
    }
  }

  let response = fetcher().await?;
  if response.is_success() {
    if let Err(e) = storage.put(runtime_generation, url, &response) {
      warn!("failed to cache response for {url}: {e}");
    }
  }

  Ok(Served {
    response,
    from: ServedFrom::Network,
  })
}
