//! Client-side data synchronization and offline caching for the Agora
//! civic-opinions platform.
//!
//! The crate is organized around four components:
//! - [`api`]: the HTTP adapter that injects bearer credentials, unwraps
//!   payload envelopes, and maps failures into a typed taxonomy
//! - [`store`]: per-entity state containers (opinions, notifications,
//!   media, moderation) mirroring server responses
//! - [`cache`]: the offline cache worker with network-first / cache-first
//!   strategies over generation-versioned storage
//! - [`routes`]: the navigation guard gating route entry on session state
//!
//! [`session`] ties them together: a single injected context holding the
//! token and user, persisted across runs, with a broadcast channel for
//! session-expiry notifications.

pub mod api;
pub mod cache;
pub mod config;
pub mod routes;
pub mod session;
pub mod store;
