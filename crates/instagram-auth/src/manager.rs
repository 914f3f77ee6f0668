//! Credential record manager: proactive refresh and initial connect
//!
//! Owns the lifecycle of the single credential record. `usable_token`
//! returns a token guaranteed not to expire within the refresh window,
//! refreshing and persisting first when needed — the feed path never has to
//! retry on an expired token. `connect` runs the initial two-step exchange
//! from the authorization-code callback.
//!
//! Both operations run under one Mutex: the original read-decide-write
//! sequence had no guard, so two concurrent refreshes could each read the
//! old record and one would overwrite the other's newer token.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use transport::HttpClient;

use crate::app::OAuthApp;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::{Error, Result};
use crate::token;

/// Refresh is attempted once the token expires within this many whole days.
pub const REFRESH_WINDOW_DAYS: i64 = 10;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days until `expiry_timestamp`, rounded up.
///
/// The window check is day-granular: a token expiring in ten days plus one
/// second counts as eleven days out and is not refreshed yet. An expired
/// timestamp counts as zero days — hard-expired and near-expiry records take
/// the same refresh path.
pub fn days_until_expiry(expiry_timestamp: u64, now: u64) -> i64 {
    let delta = expiry_timestamp as i64 - now as i64;
    if delta <= 0 {
        return 0;
    }
    (delta + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Manager for the persisted credential record.
pub struct CredentialManager {
    store: Arc<CredentialStore>,
    client: Arc<dyn HttpClient>,
    /// Serializes read-refresh-persist so concurrent callers cannot clobber
    /// each other's newer token.
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(store: Arc<CredentialStore>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            store,
            client,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Whether a credential record exists at all.
    pub async fn is_configured(&self) -> bool {
        self.store.get().await.is_some()
    }

    /// Return an access token valid beyond the refresh window, refreshing
    /// the record first when it is within (or past) the window.
    ///
    /// A refresh that succeeds upstream but fails to persist counts as a
    /// failed refresh: the next caller must see a store that matches the
    /// token actually in use.
    pub async fn usable_token(&self, now: u64) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.store.get().await.ok_or(Error::NotConfigured)?;
        let access_token = record.access_token()?;

        let days_left = days_until_expiry(record.expiry_timestamp, now);
        if days_left > REFRESH_WINDOW_DAYS {
            return Ok(access_token);
        }

        debug!(days_left, "token within refresh window, refreshing");

        let refreshed = token::refresh_long_lived_token(self.client.as_ref(), &access_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "proactive token refresh failed");
                Error::RefreshFailed
            })?;

        let replacement = CredentialRecord::new(
            &refreshed.access_token,
            record.user_id,
            now + refreshed.expires_in,
        );
        if let Err(e) = self.store.set(replacement).await {
            warn!(error = %e, "persisting refreshed token failed");
            return Err(Error::RefreshFailed);
        }

        info!(user_id = record.user_id, "access token refreshed");
        Ok(refreshed.access_token)
    }

    /// Complete the initial authorization: exchange the callback code for a
    /// short-lived token, exchange that for a long-lived token, and persist
    /// the first credential record.
    ///
    /// Returns the Instagram user id the token was issued for.
    pub async fn connect(&self, app: &OAuthApp, code: &str, now: u64) -> Result<u64> {
        let _guard = self.refresh_lock.lock().await;

        let short_lived = token::request_short_lived_token(self.client.as_ref(), app, code).await?;
        let long_lived = token::exchange_long_lived_token(
            self.client.as_ref(),
            &app.client_secret,
            &short_lived.access_token,
        )
        .await?;

        let record = CredentialRecord::new(
            &long_lived.access_token,
            short_lived.user_id,
            now + long_lived.expires_in,
        );
        self.store.set(record).await?;

        info!(user_id = short_lived.user_id, "Instagram account connected");
        Ok(short_lived.user_id)
    }
}
