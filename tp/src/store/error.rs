//! Remote store error types

use thiserror::Error;

/// Errors from the remote document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Store API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Subscription cancelled by server: {0}")]
    Cancelled(String),

    #[error("Credential revoked, sign in again")]
    AuthRevoked,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Build the error for a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => StoreError::PermissionDenied(message),
            _ => StoreError::ApiError { status, message },
        }
    }

    /// Check if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::ApiError { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            StoreError::Stream(_) => true,
            StoreError::Unavailable(_) => true,
            StoreError::PermissionDenied(_) => false,
            StoreError::Cancelled(_) => false,
            StoreError::AuthRevoked => false,
            StoreError::InvalidResponse(_) => false,
        }
    }
}
