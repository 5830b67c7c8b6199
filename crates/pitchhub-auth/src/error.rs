//! Auth Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, AuthError>;

/// Auth-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Identity provider returned an unexpected response
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Identity provider unreachable
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::ProviderUnavailable(_) | AuthError::Storage(_)
        )
    }
}
