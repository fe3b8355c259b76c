//! Offline caching layer for the portal shell and API traffic.
//!
//! This module provides the cache worker and its supporting pieces:
//! - Storage keyed by (generation, request URL), with generation-level
//!   invalidation on worker activation
//! - Network-first and cache-first strategies selected by request class
//! - Push-notification relay and structured control messages

pub mod storage;
pub mod strategy;
pub mod worker;

pub use storage::{CacheStorage, CachedResponse, MemoryCacheStorage, SqliteCacheStorage};
pub use strategy::{RequestClass, Served, ServedFrom};
pub use worker::{CacheWorker, ClientCommand, FetchOutcome, ReqwestFetch, WorkerEvent, WorkerMessage, WorkerState};
