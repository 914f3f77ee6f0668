//! HTTP transport abstraction for upstream provider calls
//!
//! Defines the `HttpClient` trait that decouples the token and feed logic
//! from the concrete HTTP stack. Production code uses `ReqwestClient`; tests
//! substitute in-memory fakes to drive failure paths and count calls without
//! touching the network.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn HttpClient>`).

use std::future::Future;
use std::pin::Pin;

/// Status + body of an upstream response.
///
/// The callers only ever need the status class and the decoded JSON body, so
/// the transport collapses responses to this pair rather than exposing the
/// full reqwest response type.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is in the 2xx class.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors from transport operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Abstraction over the outbound HTTP capability.
///
/// A transport failure is returned as `Err`; a non-2xx response is returned
/// as `Ok` with its status, because the provider embeds error details in the
/// body and the caller decides what a given status means.
pub trait HttpClient: Send + Sync {
    /// Perform a GET request against the given URL.
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;

    /// POST a form-encoded body to the given URL.
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;
}

/// Production transport backed by a shared `reqwest::Client`.
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .inner
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Http(format!("GET request failed: {e}")))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("reading response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }

    fn post_form<'a>(
        &'a self,
        url: &'a str,
        form: &'a [(&'a str, &'a str)],
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .inner
                .post(url)
                .form(form)
                .send()
                .await
                .map_err(|e| Error::Http(format!("POST request failed: {e}")))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("reading response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}
