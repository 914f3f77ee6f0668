//! Instagram OAuth authentication library
//!
//! Implements the three-step token handshake, the singleton credential file
//! store, and the proactive-refresh credential manager. This crate is a
//! standalone library with no dependency on the gateway binary — it can be
//! tested and used independently.
//!
//! Credential flow:
//! 1. User authorizes via `OAuthApp::authorize_url()`
//! 2. Callback calls `CredentialManager::connect()` with the authorization
//!    code, which chains `token::request_short_lived_token()` and
//!    `token::exchange_long_lived_token()` and persists the record
//! 3. `CredentialManager::usable_token()` serves the token for feed fetches,
//!    calling `token::refresh_long_lived_token()` when the record is within
//!    the 10-day refresh window
//! 4. Refreshed tokens replace the record via `CredentialStore::set()`

pub mod app;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod manager;
pub mod token;

pub use app::OAuthApp;
pub use credentials::{CredentialRecord, CredentialStore};
pub use error::{Error, Result};
pub use manager::{CredentialManager, REFRESH_WINDOW_DAYS, days_until_expiry};
pub use token::{
    LongLivedToken, ShortLivedToken, exchange_long_lived_token, refresh_long_lived_token,
    request_short_lived_token,
};
