//! Error types for feed retrieval

/// Errors from feed operations.
///
/// `Fetch` covers every upstream failure after a usable token was obtained —
/// transport errors, provider error bodies, and malformed media payloads all
/// collapse into the one advisory message. Detail goes to the logs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error fetching Instagram data, please re-authorise via admin and check the api")]
    Fetch,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;
