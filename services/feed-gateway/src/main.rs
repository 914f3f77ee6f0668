//! Instagram Feed Gateway
//!
//! Single-binary Rust service that:
//! 1. Completes the Instagram OAuth handshake via /auth/instagram/callback
//! 2. Keeps the long-lived token refreshed ahead of expiry
//! 3. Serves the cached, normalized media feed on /feed

mod config;
mod metrics;
mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instagram_auth::{CredentialManager, CredentialStore};
use instagram_feed::{FeedCache, FeedManager};
use transport::{HttpClient, ReqwestClient};

use crate::config::Config;
use crate::service::{AppState, ServiceMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting instagram-feed-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        redirect_uri = %config.instagram.redirect_uri,
        credentials_path = %config.storage.credentials_path.display(),
        cache_path = %config.storage.cache_path.display(),
        "configuration loaded"
    );

    // Storage directories must exist before the store or cache writes
    for path in [&config.storage.credentials_path, &config.storage.cache_path] {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating storage directory {}", parent.display()))?;
        }
    }

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::default());
    let store = Arc::new(
        CredentialStore::load(config.storage.credentials_path.clone())
            .await
            .context("loading credential store")?,
    );
    let credentials = Arc::new(CredentialManager::new(store.clone(), client.clone()));
    let feed = Arc::new(FeedManager::new(
        FeedCache::new(config.storage.cache_path.clone()),
        credentials.clone(),
        client,
    ));
    let oauth = Arc::new(config.oauth_app().context("building OAuth app config")?);

    let state = AppState {
        feed,
        credentials,
        store,
        oauth,
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };

    let app = service::build_router(state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
