//! Durable feed snapshot storage
//!
//! One JSON file holding `{"results": [...]}`. The file's modification time
//! serves as the capture timestamp — there is no explicit field. Writes use
//! atomic temp-file + rename, so a crash mid-write never corrupts the
//! previous snapshot, and the snapshot is only ever written after a
//! successful upstream fetch (the manager enforces that).
//!
//! A corrupt or unreadable file is reported as absent rather than an error:
//! the feed path always has to produce a usable result, and a bad cache file
//! is repaired by the next successful fetch overwriting it.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::media::FeedItem;

/// The persisted feed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub results: Vec<FeedItem>,
}

/// A snapshot read back from disk, with its capture time.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: Snapshot,
    /// Unix timestamp (seconds) the snapshot was written, from file mtime
    pub captured_at: u64,
}

/// File-backed snapshot store.
pub struct FeedCache {
    path: PathBuf,
}

impl FeedCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the current snapshot, if a readable one exists.
    pub async fn read(&self) -> Option<CachedSnapshot> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable snapshot file, treating as absent");
                return None;
            }
        };

        let snapshot: Snapshot = match serde_json::from_str(&contents) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt snapshot file, treating as absent");
                return None;
            }
        };

        let captured_at = match self.modified_at().await {
            Some(t) => t,
            None => return None,
        };

        Some(CachedSnapshot {
            snapshot,
            captured_at,
        })
    }

    /// Overwrite the snapshot atomically.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| Error::Io(format!("serializing snapshot: {e}")))?;
        write_atomic(&self.path, &json).await?;
        debug!(path = %self.path.display(), items = snapshot.results.len(), "persisted feed snapshot");
        Ok(())
    }

    /// File mtime as unix seconds.
    async fn modified_at(&self) -> Option<u64> {
        let metadata = tokio::fs::metadata(&self.path).await.ok()?;
        let modified = metadata.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        Some(since_epoch.as_secs())
    }
}

/// Write snapshot JSON to a file atomically (temp file + rename).
async fn write_atomic(path: &Path, json: &str) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("snapshot path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".snapshot.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp snapshot file: {e}")))?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp snapshot file: {e}")))?;

    Ok(())
}
