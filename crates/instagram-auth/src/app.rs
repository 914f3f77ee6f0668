//! OAuth application configuration and authorization URL construction
//!
//! `OAuthApp` is built once from gateway configuration and passed explicitly
//! into every token operation — there is no memoized process-wide redirect
//! URL or client state.

use common::Secret;

use crate::endpoints::{AUTHORIZE_ENDPOINT, SCOPES};

/// The registered Instagram application this gateway authenticates as.
///
/// `redirect_uri` must match the URI registered with the provider exactly;
/// it is sent both in the authorization URL and in the code exchange.
#[derive(Debug)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: String,
}

impl OAuthApp {
    /// Build the full authorization URL requiring user sign-on and consent.
    ///
    /// Pure string construction; the provider redirects back to
    /// `redirect_uri` with a `code` query parameter on success.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            AUTHORIZE_ENDPOINT,
            self.client_id,
            urlencoded(&self.redirect_uri),
            SCOPES,
        )
    }
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('&', "%26")
        .replace('?', "%3F")
}
