//! IdentityProvider trait definition

use std::fmt;

use async_trait::async_trait;

use super::IdentityError;

/// How an identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOrigin {
    /// Provider-issued anonymous account
    Anonymous,
    /// Exchanged from an externally supplied continuation token
    Token,
    /// Generated in-process by a provider that never talks to a server
    Local,
    /// Generated in-process after the provider failed; not recognized by other clients
    LocalFallback,
}

/// The session's user identity
///
/// Used only to stamp `lastUpdatedBy` on writes, never for authorization
/// decisions inside the core.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier written into `lastUpdatedBy`
    pub user_id: String,
    /// Provider credential the store may require (e.g. an id token)
    pub credential: Option<String>,
    pub origin: IdentityOrigin,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, origin: IdentityOrigin) -> Self {
        Self {
            user_id: user_id.into(),
            credential: None,
            origin,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Fresh random identity that only this session knows about
    pub fn local_fallback() -> Self {
        Self::new(format!("local-{}", uuid::Uuid::new_v4()), IdentityOrigin::LocalFallback)
    }

    /// True when attribution is recognized beyond this session
    pub fn is_shared(&self) -> bool {
        !matches!(self.origin, IdentityOrigin::LocalFallback | IdentityOrigin::Local)
    }
}

// Keep credentials out of logs
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("origin", &self.origin)
            .finish()
    }
}

/// Hosted authentication provider
///
/// Implementations may cache the identity they hand out; `current` reports
/// it so a second acquisition in the same process reuses it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity already active in this provider, if any
    async fn current(&self) -> Option<Identity>;

    /// Request a new anonymous identity
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError>;

    /// Exchange an externally supplied continuation token for an identity
    async fn sign_in_with_token(&self, token: &str) -> Result<Identity, IdentityError>;
}
