//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the IG_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub instagram: InstagramConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// Registered Instagram application settings
#[derive(Debug, Deserialize)]
pub struct InstagramConfig {
    pub client_id: String,
    /// Must match the redirect URI registered with the provider exactly
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret>,
    /// Path to a file containing the client secret (alternative to the
    /// IG_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Durable state locations
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Singleton credential record (JSON, 0600)
    pub credentials_path: PathBuf,
    /// Feed snapshot file; its mtime doubles as the capture timestamp
    pub cache_path: PathBuf,
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. IG_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.instagram.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        // Validate redirect_uri is a URL with http(s) scheme
        if !config.instagram.redirect_uri.starts_with("http://")
            && !config.instagram.redirect_uri.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                config.instagram.redirect_uri
            )));
        }

        // Validate max_connections is non-zero
        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("IG_CLIENT_SECRET") {
            config.instagram.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.instagram.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.instagram.client_secret = Some(Secret::new(secret));
            }
        }

        if config.instagram.client_secret.is_none() {
            return Err(common::Error::Config(
                "client secret not configured — set IG_CLIENT_SECRET or client_secret_file".into(),
            ));
        }

        Ok(config)
    }

    /// Build the OAuth application value passed into token operations.
    pub fn oauth_app(&self) -> common::Result<instagram_auth::OAuthApp> {
        let client_secret = self
            .instagram
            .client_secret
            .clone()
            .ok_or_else(|| common::Error::Config("client secret not resolved".into()))?;
        Ok(instagram_auth::OAuthApp {
            client_id: self.instagram.client_id.clone(),
            client_secret,
            redirect_uri: self.instagram.redirect_uri.clone(),
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("feed-gateway.toml")
    }
}
