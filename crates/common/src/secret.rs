//! Secret wrapper for sensitive string values
//!
//! The only secret this workspace handles is the Instagram client secret, so
//! the wrapper is specialized to `String`. Redacted in Debug/Display and
//! zeroized on drop.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive string value - redacted in Debug/Display/logs
pub struct Secret(String);

impl Secret {
    /// Create a new secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
