//! Token exchange and refresh against the Instagram endpoints
//!
//! Implements the three token endpoint interactions:
//! 1. Authorization-code → short-lived token (POST to `api.instagram.com`)
//! 2. Short-lived → long-lived token (`grant_type=ig_exchange_token`)
//! 3. Long-lived refresh (`grant_type=ig_refresh_token`)
//!
//! All three share one failure contract: transport failure, a non-success
//! status, a provider `error` object, or a numeric error `code` in the body
//! each collapse to `Error::Exchange`. Detail is logged, never returned.

use common::Secret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;
use transport::{HttpClient, HttpResponse};

use crate::app::OAuthApp;
use crate::endpoints::{
    LONG_LIVED_TOKEN_ENDPOINT, REFRESH_TOKEN_ENDPOINT, SHORT_LIVED_TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};

/// Response from the initial authorization-code exchange.
///
/// `user_id` identifies the Instagram account the token was issued for.
/// It is carried on the credential record for diagnostics only.
#[derive(Debug, Deserialize)]
pub struct ShortLivedToken {
    pub access_token: String,
    pub user_id: u64,
}

/// Response from the long-lived exchange and from a refresh.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts this to an absolute unix timestamp when storing the credential.
#[derive(Debug, Deserialize)]
pub struct LongLivedToken {
    pub access_token: String,
    /// Seconds until the token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Exchange an authorization code for a short-lived token.
///
/// This is the first step after the user authorized in their browser and the
/// provider redirected back with the code. The redirect URI sent here must
/// match the one used in the authorization URL.
pub async fn request_short_lived_token(
    client: &dyn HttpClient,
    app: &OAuthApp,
    code: &str,
) -> Result<ShortLivedToken> {
    let form = [
        ("client_id", app.client_id.as_str()),
        ("client_secret", app.client_secret.expose()),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", app.redirect_uri.as_str()),
    ];

    let response = client
        .post_form(SHORT_LIVED_TOKEN_ENDPOINT, &form)
        .await
        .map_err(|e| {
            warn!(error = %e, "short-lived token request failed");
            Error::Exchange
        })?;

    decode_token_response(&response, "short_lived_exchange")
}

/// Exchange a short-lived token for a long-lived one.
pub async fn exchange_long_lived_token(
    client: &dyn HttpClient,
    client_secret: &Secret,
    short_lived_token: &str,
) -> Result<LongLivedToken> {
    let url = format!(
        "{LONG_LIVED_TOKEN_ENDPOINT}?grant_type=ig_exchange_token&client_secret={}&access_token={}",
        client_secret.expose(),
        short_lived_token,
    );

    let response = client.get(&url).await.map_err(|e| {
        warn!(error = %e, "long-lived token exchange failed");
        Error::Exchange
    })?;

    decode_token_response(&response, "long_lived_exchange")
}

/// Generate a new long-lived token by refreshing an existing one.
///
/// Called proactively by the credential manager before the record enters
/// its expiry window; no refresh token exists in this flow — the access
/// token refreshes itself.
pub async fn refresh_long_lived_token(
    client: &dyn HttpClient,
    access_token: &str,
) -> Result<LongLivedToken> {
    let url = format!(
        "{REFRESH_TOKEN_ENDPOINT}?grant_type=ig_refresh_token&access_token={access_token}"
    );

    let response = client.get(&url).await.map_err(|e| {
        warn!(error = %e, "token refresh request failed");
        Error::Exchange
    })?;

    decode_token_response(&response, "refresh")
}

/// Decode a token endpoint response into its typed form.
///
/// The provider reports failures two ways: an `error` object, or a numeric
/// `code` field (e.g. 400) embedded in an otherwise-200 body. Both, plus a
/// non-success status and a body missing required fields, map to the same
/// generic `Error::Exchange`.
fn decode_token_response<T: DeserializeOwned>(response: &HttpResponse, operation: &str) -> Result<T> {
    if !response.is_success() {
        warn!(operation, status = response.status, "token endpoint returned error status");
        return Err(Error::Exchange);
    }

    let value: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
        warn!(operation, error = %e, "token endpoint returned unparseable body");
        Error::Exchange
    })?;

    if provider_reported_error(&value) {
        warn!(operation, "token endpoint reported an error in its body");
        return Err(Error::Exchange);
    }

    serde_json::from_value(value).map_err(|e| {
        warn!(operation, error = %e, "token response missing required fields");
        Error::Exchange
    })
}

fn provider_reported_error(value: &serde_json::Value) -> bool {
    if value.get("error").is_some() {
        return true;
    }
    value
        .get("code")
        .and_then(serde_json::Value::as_i64)
        .is_some_and(|code| code >= 400)
}
