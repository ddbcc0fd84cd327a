//! Identity error types

use thiserror::Error;

/// Errors from the identity provider
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Identity API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Sign-in not supported by this provider: {0}")]
    Unsupported(String),
}

impl IdentityError {
    /// True when the provider answered and said no (as opposed to being unreachable)
    pub fn is_rejection(&self) -> bool {
        match self {
            IdentityError::ApiError { status, .. } => (400..500).contains(status),
            IdentityError::Unsupported(_) => true,
            IdentityError::Network(_) | IdentityError::InvalidResponse(_) => false,
        }
    }
}
