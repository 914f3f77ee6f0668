//! Error types for Instagram authentication operations
//!
//! Token-operation failures deliberately collapse to one generic variant:
//! callers never need to distinguish a transport failure from an
//! API-rejected exchange, and the fixed message keeps provider error
//! internals out of anything user-facing. Detail goes to the logs.

/// Errors from authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or provider-reported error during any token operation.
    #[error("there was a problem exchanging tokens with Instagram, please try again later")]
    Exchange,

    /// No credential record exists — initial authorization has not happened.
    #[error("no Instagram account is connected, please authorise via the admin flow")]
    NotConfigured,

    /// Proactive refresh failed, either upstream or while persisting.
    #[error("error regenerating Instagram token, please re-authorise via the admin flow")]
    RefreshFailed,

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
