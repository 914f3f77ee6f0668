//! Feed cache manager: the single entry point for feed data
//!
//! `feed()` never fails at the type level — every outcome is a `FeedResult`
//! with items and an optional advisory message, because the boundary is
//! presentation-facing. The freshness window keeps the dominant path to one
//! file read; everything slower runs behind a Mutex so two concurrent cache
//! misses produce one upstream fetch, not two racing snapshot writes.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use transport::HttpClient;

use instagram_auth::CredentialManager;

use crate::cache::{FeedCache, Snapshot};
use crate::error::{Error, Result};
use crate::media::{FeedItem, MediaList};

/// Age in seconds under which a snapshot is served without any upstream call.
pub const FRESHNESS_WINDOW_SECS: u64 = 900;

/// Graph endpoint listing the authenticated user's media
pub const MEDIA_ENDPOINT: &str = "https://graph.instagram.com/me/media";

/// Fields requested from the media endpoint — the minimal set needed to
/// build the caption/link/thumbnail tuples
pub const MEDIA_FIELDS: &str = "id,caption,media_type,media_url,thumbnail_url,permalink";

/// Value returned to feed callers.
///
/// `error` is advisory text for display, not a typed error object; a
/// non-empty error always comes with an empty item list, and served items
/// (fresh or stale) always come without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedResult {
    pub results: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedResult {
    fn served(results: Vec<FeedItem>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            results: Vec::new(),
            error: Some(message),
        }
    }
}

/// Manager orchestrating snapshot cache, credential manager, and upstream.
pub struct FeedManager {
    cache: FeedCache,
    credentials: Arc<CredentialManager>,
    client: Arc<dyn HttpClient>,
    /// Serializes the whole miss path (credential check, fetch, snapshot
    /// write) across concurrent requests.
    fetch_lock: Mutex<()>,
}

impl FeedManager {
    pub fn new(
        cache: FeedCache,
        credentials: Arc<CredentialManager>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            cache,
            credentials,
            client,
            fetch_lock: Mutex::new(()),
        }
    }

    /// When the current snapshot was captured, if one exists (for health
    /// reporting).
    pub async fn snapshot_captured_at(&self) -> Option<u64> {
        self.cache.read().await.map(|c| c.captured_at)
    }

    /// Serve the feed as of `now` (unix seconds).
    pub async fn feed(&self, now: u64) -> FeedResult {
        // Dominant cheap path: fresh snapshot, no lock, no network
        if let Some(cached) = self.cache.read().await {
            if now.saturating_sub(cached.captured_at) < FRESHNESS_WINDOW_SECS {
                metrics::counter!("feed_cache_hits_total").increment(1);
                return FeedResult::served(cached.snapshot.results);
            }
        }

        let _guard = self.fetch_lock.lock().await;

        // Re-check under the lock: a concurrent miss may have refreshed the
        // snapshot while this request waited
        if let Some(cached) = self.cache.read().await {
            if now.saturating_sub(cached.captured_at) < FRESHNESS_WINDOW_SECS {
                metrics::counter!("feed_cache_hits_total").increment(1);
                return FeedResult::served(cached.snapshot.results);
            }
        }

        let access_token = match self.credentials.usable_token(now).await {
            Ok(token) => token,
            Err(e) => {
                // A broken credential won't self-heal by replaying a stale
                // feed — surface the re-auth message instead of falling back
                return FeedResult::failed(e.to_string());
            }
        };

        metrics::counter!("feed_upstream_fetches_total").increment(1);

        let url = format!("{MEDIA_ENDPOINT}?fields={MEDIA_FIELDS}&access_token={access_token}");
        let results = match self.fetch_media(&url).await {
            Ok(results) => results,
            Err(e) => {
                metrics::counter!("feed_upstream_errors_total").increment(1);
                if let Some(cached) = self.cache.read().await {
                    debug!("upstream fetch failed, serving last-known snapshot");
                    return FeedResult::served(cached.snapshot.results);
                }
                return FeedResult::failed(e.to_string());
            }
        };

        let snapshot = Snapshot { results };
        if let Err(e) = self.cache.write(&snapshot).await {
            // Old snapshot file is untouched (atomic rename); serve the
            // fresh data anyway
            warn!(error = %e, "persisting feed snapshot failed");
        }
        FeedResult::served(snapshot.results)
    }

    /// Fetch and normalize the media list.
    async fn fetch_media(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self.client.get(url).await.map_err(|e| {
            warn!(error = %e, "media fetch transport failure");
            Error::Fetch
        })?;

        if !response.is_success() {
            warn!(status = response.status, "media endpoint returned error status");
            return Err(Error::Fetch);
        }

        let value: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            warn!(error = %e, "media endpoint returned unparseable body");
            Error::Fetch
        })?;

        if value.get("error").is_some() {
            warn!("media endpoint reported an error in its body");
            return Err(Error::Fetch);
        }

        let list: MediaList = serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "media response missing required fields");
            Error::Fetch
        })?;

        // Upstream order is preserved; one bad entry fails the whole fetch
        // so a partial feed is never served or cached
        list.data
            .into_iter()
            .map(|entry| entry.normalize())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instagram_auth::{CredentialRecord, CredentialStore};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::UNIX_EPOCH;
    use transport::HttpResponse;

    struct StubClient {
        responses: std::sync::Mutex<VecDeque<transport::Result<HttpResponse>>>,
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl StubClient {
        fn new(responses: Vec<transport::Result<HttpResponse>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses.into()),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next_response(&self, url: &str) -> transport::Result<HttpResponse> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("stub ran out of scripted responses")
        }
    }

    impl HttpClient for StubClient {
        fn get<'a>(
            &'a self,
            url: &'a str,
        ) -> Pin<Box<dyn Future<Output = transport::Result<HttpResponse>> + Send + 'a>> {
            let result = self.next_response(url);
            Box::pin(async move { result })
        }

        fn post_form<'a>(
            &'a self,
            url: &'a str,
            _form: &'a [(&'a str, &'a str)],
        ) -> Pin<Box<dyn Future<Output = transport::Result<HttpResponse>> + Send + 'a>> {
            let result = self.next_response(url);
            Box::pin(async move { result })
        }
    }

    fn ok(body: &str) -> transport::Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            body: body.into(),
        })
    }

    fn transport_err() -> transport::Result<HttpResponse> {
        Err(transport::Error::Http("connection reset".into()))
    }

    const DAY: u64 = 86_400;

    /// Snapshot mtimes come from the real filesystem clock, so tests anchor
    /// `now` to wall time and move it forward to age the cache.
    fn wall_now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    const MIXED_MEDIA_BODY: &str = r#"{
        "data": [
            {"id": "1", "caption": "launch day", "media_type": "IMAGE",
             "media_url": "https://cdn.example/a.jpg",
             "permalink": "https://www.instagram.com/p/a/"},
            {"id": "2", "caption": "behind the scenes", "media_type": "VIDEO",
             "media_url": "https://cdn.example/b.mp4",
             "thumbnail_url": "https://cdn.example/b-poster.jpg",
             "permalink": "https://www.instagram.com/p/b/"}
        ]
    }"#;

    struct Fixture {
        manager: FeedManager,
        client: Arc<StubClient>,
        store: Arc<CredentialStore>,
        cache_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    /// Build a manager with an optional valid credential and scripted
    /// transport responses.
    async fn fixture(
        configured: bool,
        responses: Vec<transport::Result<HttpResponse>>,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            CredentialStore::load(dir.path().join("credential.json"))
                .await
                .unwrap(),
        );
        if configured {
            store
                .set(CredentialRecord::new(
                    "ll_token",
                    17841400,
                    wall_now() + 60 * DAY,
                ))
                .await
                .unwrap();
        }
        let client = Arc::new(StubClient::new(responses));
        let credentials = Arc::new(CredentialManager::new(store.clone(), client.clone()));
        let cache_path = dir.path().join("instagram.json");
        let manager = FeedManager::new(
            FeedCache::new(cache_path.clone()),
            credentials,
            client.clone(),
        );
        Fixture {
            manager,
            client,
            store,
            cache_path,
            _dir: dir,
        }
    }

    async fn seed_cache(fixture: &Fixture, items: Vec<FeedItem>) {
        FeedCache::new(fixture.cache_path.clone())
            .write(&Snapshot { results: items })
            .await
            .unwrap();
    }

    fn cached_item() -> FeedItem {
        FeedItem {
            caption: Some("from cache".into()),
            link: "https://www.instagram.com/p/cached/".into(),
            thumbnail_url: "https://cdn.example/cached.jpg".into(),
        }
    }

    #[tokio::test]
    async fn fresh_snapshot_served_without_network() {
        let f = fixture(true, vec![]).await;
        seed_cache(&f, vec![cached_item()]).await;

        let result = f.manager.feed(wall_now()).await;
        assert_eq!(result.results, vec![cached_item()]);
        assert!(result.error.is_none());
        assert_eq!(f.client.call_count(), 0, "fresh cache must make zero network calls");
    }

    #[tokio::test]
    async fn stale_snapshot_triggers_refetch_and_overwrite() {
        let f = fixture(true, vec![ok(MIXED_MEDIA_BODY)]).await;
        seed_cache(&f, vec![cached_item()]).await;

        // Move time past the freshness window
        let result = f.manager.feed(wall_now() + FRESHNESS_WINDOW_SECS + 10).await;
        assert!(result.error.is_none());
        assert_eq!(result.results.len(), 2);
        assert_eq!(f.client.call_count(), 1);

        // The snapshot now holds the new data
        let cached = FeedCache::new(f.cache_path.clone()).read().await.unwrap();
        assert_eq!(cached.snapshot.results, result.results);
    }

    #[tokio::test]
    async fn two_calls_within_window_fetch_once_and_match_exactly() {
        let f = fixture(true, vec![ok(MIXED_MEDIA_BODY)]).await;

        let now = wall_now();
        let first = f.manager.feed(now).await;
        let second = f.manager.feed(now).await;

        assert_eq!(f.client.call_count(), 1, "second call must be a cache hit");
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap(),
            "results must be byte-identical within the window"
        );
    }

    #[tokio::test]
    async fn unconfigured_credential_beats_stale_cache() {
        let f = fixture(false, vec![]).await;
        seed_cache(&f, vec![cached_item()]).await;

        let result = f.manager.feed(wall_now() + FRESHNESS_WINDOW_SECS + 10).await;
        assert!(result.results.is_empty(), "stale data must not mask a config error");
        let message = result.error.expect("credential error must be surfaced");
        assert!(message.contains("authorise"), "got: {message}");
        assert_eq!(f.client.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_beats_stale_cache() {
        let f = fixture(true, vec![transport_err()]).await;
        seed_cache(&f, vec![cached_item()]).await;

        // Age the credential into the refresh window so usable_token refreshes
        let now = wall_now();
        f.store
            .set(CredentialRecord::new("ll_token", 17841400, now + 2 * DAY))
            .await
            .unwrap();

        let result = f.manager.feed(now + FRESHNESS_WINDOW_SECS + 10).await;
        assert!(result.results.is_empty());
        let message = result.error.expect("refresh failure must be surfaced");
        assert!(message.contains("re-authorise"), "got: {message}");
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_stale_snapshot_verbatim() {
        let f = fixture(true, vec![transport_err()]).await;
        seed_cache(&f, vec![cached_item()]).await;

        let result = f.manager.feed(wall_now() + FRESHNESS_WINDOW_SECS + 10).await;
        assert_eq!(result.results, vec![cached_item()]);
        assert!(
            result.error.is_none(),
            "stale fallback is degraded service, not an error result"
        );
    }

    #[tokio::test]
    async fn fetch_failure_without_snapshot_reports_error() {
        let f = fixture(true, vec![ok(r#"{"error":{"message":"rate limited","code":4}}"#)]).await;

        let result = f.manager.feed(wall_now()).await;
        assert!(result.results.is_empty());
        let message = result.error.expect("fetch failure must be reported");
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn mixed_media_normalizes_both_branches() {
        let f = fixture(true, vec![ok(MIXED_MEDIA_BODY)]).await;

        let result = f.manager.feed(wall_now()).await;
        assert!(result.error.is_none());
        assert_eq!(result.results.len(), 2);

        // IMAGE keeps media_url, VIDEO substitutes thumbnail_url, upstream order preserved
        assert_eq!(result.results[0].thumbnail_url, "https://cdn.example/a.jpg");
        assert_eq!(
            result.results[1].thumbnail_url,
            "https://cdn.example/b-poster.jpg"
        );
        assert_eq!(result.results[0].link, "https://www.instagram.com/p/a/");
        assert_eq!(result.results[1].link, "https://www.instagram.com/p/b/");
    }

    #[tokio::test]
    async fn malformed_entry_fails_whole_fetch_not_partially() {
        // Second entry is a VIDEO without thumbnail_url
        let body = r#"{
            "data": [
                {"id": "1", "media_type": "IMAGE",
                 "media_url": "https://cdn.example/a.jpg",
                 "permalink": "https://www.instagram.com/p/a/"},
                {"id": "2", "media_type": "VIDEO",
                 "media_url": "https://cdn.example/b.mp4",
                 "permalink": "https://www.instagram.com/p/b/"}
            ]
        }"#;
        let f = fixture(true, vec![ok(body)]).await;
        seed_cache(&f, vec![cached_item()]).await;

        let result = f.manager.feed(wall_now() + FRESHNESS_WINDOW_SECS + 10).await;
        // Falls back to the stale snapshot — never a one-item partial feed
        assert_eq!(result.results, vec![cached_item()]);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_never_clears_existing_snapshot() {
        let f = fixture(true, vec![ok(MIXED_MEDIA_BODY), transport_err()]).await;

        let now = wall_now();
        let first = f.manager.feed(now).await;
        assert!(first.error.is_none());

        let second = f.manager.feed(now + FRESHNESS_WINDOW_SECS + 10).await;
        assert_eq!(second.results, first.results, "stale fallback serves the old snapshot");

        // Snapshot file still holds the successful fetch's data
        let cached = FeedCache::new(f.cache_path.clone()).read().await.unwrap();
        assert_eq!(cached.snapshot.results, first.results);
    }

    #[tokio::test]
    async fn near_expiry_credential_refreshes_before_fetch() {
        let now = wall_now();
        let f = fixture(false, vec![
            ok(r#"{"access_token":"ll_fresh","token_type":"bearer","expires_in":5184000}"#),
            ok(MIXED_MEDIA_BODY),
        ])
        .await;
        f.store
            .set(CredentialRecord::new("ll_aging", 17841400, now + 2 * DAY))
            .await
            .unwrap();

        let result = f.manager.feed(now).await;
        assert!(result.error.is_none());

        let calls = f.client.calls();
        assert_eq!(calls.len(), 2);
        assert!(
            calls[0].contains("grant_type=ig_refresh_token"),
            "refresh must run before the media fetch: {calls:?}"
        );
        assert!(calls[1].starts_with(MEDIA_ENDPOINT));
        assert!(
            calls[1].contains("access_token=ll_fresh"),
            "media fetch must use the refreshed token: {}",
            calls[1]
        );

        // The record was fully replaced, user_id preserved
        let record = f.store.get().await.unwrap();
        assert_eq!(record.access_token().unwrap(), "ll_fresh");
        assert_eq!(record.user_id, 17841400);
    }

    #[tokio::test]
    async fn media_url_carries_requested_fields() {
        let f = fixture(true, vec![ok(MIXED_MEDIA_BODY)]).await;
        f.manager.feed(wall_now()).await;

        let calls = f.client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with(MEDIA_ENDPOINT));
        assert!(calls[0].contains(&format!("fields={MEDIA_FIELDS}")));
        assert!(calls[0].contains("access_token=ll_token"));
    }

    #[tokio::test]
    async fn snapshot_captured_at_reports_cache_state() {
        let f = fixture(true, vec![]).await;
        assert!(f.manager.snapshot_captured_at().await.is_none());

        seed_cache(&f, vec![cached_item()]).await;
        assert!(f.manager.snapshot_captured_at().await.is_some());
    }
}
