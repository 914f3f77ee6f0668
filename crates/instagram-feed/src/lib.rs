//! Cache-backed Instagram feed serving
//!
//! Owns the durable feed snapshot and orchestrates the fetch path behind a
//! single entry point. The snapshot file is the source of truth for what
//! callers see; the upstream API is only consulted when the snapshot is
//! older than the freshness window.
//!
//! Serving order for `FeedManager::feed()`:
//! 1. Snapshot fresher than 900 s → served verbatim, zero network activity
//! 2. Credential error (absent record, failed refresh) → explicit advisory
//!    error, never a stale fallback — a broken credential won't self-heal
//!    by replaying old data
//! 3. Upstream fetch failure → last-known snapshot if one exists, however
//!    stale, else an empty result with a fetch-error message
//! 4. Successful fetch → normalize, overwrite the snapshot, serve

pub mod cache;
pub mod error;
pub mod manager;
pub mod media;

pub use cache::{CachedSnapshot, FeedCache, Snapshot};
pub use error::{Error, Result};
pub use manager::{FRESHNESS_WINDOW_SECS, FeedManager, FeedResult};
pub use media::{FeedItem, MediaEntry, MediaList};
