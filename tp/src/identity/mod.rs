//! Identity Provider Adapter
//!
//! Obtains the user identifier that stamps `lastUpdatedBy` on every write.
//! Acquisition happens once per session and always yields an identity: if
//! the hosted provider cannot be reached, a local fallback id is used and a
//! warning is surfaced instead of blocking the session.

use std::sync::Arc;

use tracing::debug;

mod acquire;
mod error;
mod http;
mod local;
pub mod provider;

pub use acquire::{IdentityOutcome, acquire_identity};
pub use error::IdentityError;
pub use http::HttpIdentityProvider;
pub use local::LocalIdentityProvider;
pub use provider::{Identity, IdentityOrigin, IdentityProvider};

use crate::config::{IdentityBackend, IdentityConfig};

/// Create the identity provider selected in config
pub fn create_provider(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>, IdentityError> {
    debug!(provider = ?config.provider, "create_provider: called");
    match config.provider {
        IdentityBackend::Http => Ok(Arc::new(HttpIdentityProvider::from_config(config)?)),
        IdentityBackend::Local => Ok(Arc::new(LocalIdentityProvider::new())),
    }
}
