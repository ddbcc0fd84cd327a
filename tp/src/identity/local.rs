//! Provider that never leaves the process

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{Identity, IdentityError, IdentityOrigin, IdentityProvider};

/// Hands out one random identifier per provider instance
///
/// Used with the in-memory store, where there is no hosted provider to ask.
#[derive(Default)]
pub struct LocalIdentityProvider {
    active: Mutex<Option<Identity>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already holds the given user id
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            active: Mutex::new(Some(Identity::new(user_id, IdentityOrigin::Local))),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current(&self) -> Option<Identity> {
        self.active.lock().ok().and_then(|a| a.clone())
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        debug!("LocalIdentityProvider::sign_in_anonymously: called");
        let identity = Identity::new(uuid::Uuid::now_v7().to_string(), IdentityOrigin::Local);
        if let Ok(mut active) = self.active.lock() {
            *active = Some(identity.clone());
        }
        Ok(identity)
    }

    async fn sign_in_with_token(&self, _token: &str) -> Result<Identity, IdentityError> {
        Err(IdentityError::Unsupported("local provider cannot exchange tokens".to_string()))
    }
}
