//! Credential storage for the Instagram token
//!
//! Manages a JSON file holding the single credential record. All writes use
//! atomic temp-file + rename, and the disk write happens before the
//! in-memory replace, so a failed write leaves the previous record fully
//! intact — a reader never observes a partial update. A tokio Mutex
//! serializes access from the callback handler and the refresh path.
//!
//! An absent file is the valid "unauthenticated" state; the record is never
//! explicitly deleted.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The single persisted authorization state.
///
/// `token` is stored base64-encoded. The encoding is obfuscation only, not a
/// security boundary — the file carries 0600 permissions for that.
/// `expiry_timestamp` is an absolute unix timestamp in seconds, computed at
/// storage time from the provider's `expires_in` delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Long-lived access token, base64-encoded at rest
    pub token: String,
    /// Instagram account the token was issued for (diagnostic only)
    pub user_id: u64,
    /// Expiration as unix timestamp in seconds (absolute, not a delta)
    pub expiry_timestamp: u64,
}

impl CredentialRecord {
    /// Build a record from a plain access token, encoding it for storage.
    pub fn new(access_token: &str, user_id: u64, expiry_timestamp: u64) -> Self {
        Self {
            token: STANDARD.encode(access_token),
            user_id,
            expiry_timestamp,
        }
    }

    /// Decode the stored token back to its plain form.
    pub fn access_token(&self) -> Result<String> {
        let bytes = STANDARD
            .decode(&self.token)
            .map_err(|e| Error::CredentialParse(format!("decoding stored token: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::CredentialParse(format!("stored token is not valid UTF-8: {e}")))
    }
}

/// Thread-safe singleton credential file manager.
///
/// The Mutex serializes all access. Reads acquire the lock briefly to clone
/// the in-memory state, so feed-path reads don't block on a refresh write.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Option<CredentialRecord>>,
}

impl CredentialStore {
    /// Load the credential record from the given file path.
    ///
    /// A missing file is not an error — it means no account has been
    /// connected yet, and `get()` will return `None` until the first `set()`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let record: CredentialRecord = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), user_id = record.user_id, "loaded credential");
            Some(record)
        } else {
            info!(path = %path.display(), "credential file not found, starting unauthenticated");
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the current record, if one exists.
    pub async fn get(&self) -> Option<CredentialRecord> {
        let state = self.state.lock().await;
        state.clone()
    }

    /// Replace the record and persist to disk.
    ///
    /// The disk write happens first; the in-memory state is only replaced on
    /// success, so callers observe either the fully-old or fully-new record.
    pub async fn set(&self, record: CredentialRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        write_atomic(&self.path, &record).await?;
        debug!(user_id = record.user_id, "stored credential");
        *state = Some(record);
        Ok(())
    }
}

/// Write the credential record to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains the access token.
async fn write_atomic(path: &Path, record: &CredentialRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
