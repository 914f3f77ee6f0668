//! Route handlers and shared application state
//!
//! The gateway exposes five routes: the feed itself, the two ends of the
//! authorization flow, health, and metrics. Everything interesting happens
//! in the library crates — handlers translate HTTP to core calls and core
//! results back to JSON.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{debug, info, warn};

use instagram_auth::{CredentialManager, CredentialStore, OAuthApp};
use instagram_feed::FeedManager;

use crate::metrics;

/// Basic service counters surfaced on /health.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub started_at: Instant,
    pub requests_total: Arc<AtomicU64>,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedManager>,
    pub credentials: Arc<CredentialManager>,
    pub store: Arc<CredentialStore>,
    pub oauth: Arc<OAuthApp>,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/feed", get(feed_handler))
        .route("/auth/instagram", get(authorize_handler))
        .route("/auth/instagram/callback", get(callback_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// GET /feed — serve the cached or freshly fetched feed.
///
/// Always 200 with a `FeedResult` body: failures are advisory messages in
/// the `error` field, never HTTP errors — the boundary is presentation-facing.
async fn feed_handler(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let result = state.feed.feed(unix_now()).await;
    match &result.error {
        Some(error) => info!(request_id, error, "feed request completed with advisory error"),
        None => debug!(request_id, items = result.results.len(), "feed request served"),
    }

    metrics::record_request("/feed", 200, started.elapsed().as_secs_f64());
    (StatusCode::OK, axum::Json(result))
}

/// GET /auth/instagram — redirect the user to the provider's consent page.
async fn authorize_handler(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.oauth.authorize_url())
}

/// Query parameters the provider sends to the callback.
#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// GET /auth/instagram/callback — complete the authorization handshake.
///
/// Exchanges the code through the short-lived and long-lived steps and
/// persists the initial credential record. Returns JSON status rather than
/// rendering anything — notices are the host application's concern.
async fn callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let started = Instant::now();

    let code = match query.code.as_deref().filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => {
            metrics::record_request("/auth/instagram/callback", 400, started.elapsed().as_secs_f64());
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({
                    "status": "error",
                    "error": "missing authorization code"
                })),
            )
                .into_response();
        }
    };

    match state.credentials.connect(&state.oauth, code, unix_now()).await {
        Ok(user_id) => {
            metrics::record_request("/auth/instagram/callback", 200, started.elapsed().as_secs_f64());
            (
                StatusCode::OK,
                axum::Json(serde_json::json!({
                    "status": "connected",
                    "user_id": user_id
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "authorization callback failed");
            metrics::record_request("/auth/instagram/callback", 502, started.elapsed().as_secs_f64());
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(serde_json::json!({
                    "status": "error",
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// GET /health — gateway health and credential state.
///
/// Returns 200 when a credential record exists, 503 when the gateway is
/// unauthenticated (feed requests would only ever return config errors).
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let snapshot_at = state.feed.snapshot_captured_at().await;

    let (status_code, body) = match state.store.get().await {
        Some(record) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "authenticated": true,
                "token_expiry_timestamp": record.expiry_timestamp,
                "cache_present": snapshot_at.is_some(),
                "uptime_seconds": uptime,
                "requests_served": requests,
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "degraded",
                "authenticated": false,
                "cache_present": snapshot_at.is_some(),
                "uptime_seconds": uptime,
                "requests_served": requests,
            }),
        ),
    };

    (status_code, axum::Json(body))
}

/// GET /metrics — Prometheus text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
