//! SessionContext - the per-session service bundle
//!
//! Built once at session start and shared by `Arc`. Owns the identity and
//! the sync engine; [`SessionContext::teardown`] cancels the subscription.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::SessionError;
use crate::config::Config;
use crate::identity::{Identity, IdentityOutcome, IdentityProvider, acquire_identity, create_provider};
use crate::store::{RemoteStore, create_store};
use crate::sync::SyncEngine;

pub struct SessionContext {
    outcome: IdentityOutcome,
    engine: Arc<SyncEngine>,
    startup_error: Option<String>,
}

impl SessionContext {
    /// Start a session from config: identity, then store, then subscription
    pub async fn start(config: &Config) -> Result<Arc<Self>, SessionError> {
        debug!(collection = %config.collection_path(), "SessionContext::start: called");
        let provider = create_provider(&config.identity)?;
        let outcome = acquire_identity(provider.as_ref(), config.identity.continuation_token.as_deref()).await;
        let store = create_store(&config.store, &outcome.identity)?;
        Ok(Self::connect(config.collection_path(), outcome, store).await)
    }

    /// Start a session against an already built store
    pub async fn with_provider(
        collection: impl Into<String>,
        provider: &dyn IdentityProvider,
        continuation_token: Option<&str>,
        store: Arc<dyn RemoteStore>,
    ) -> Arc<Self> {
        let outcome = acquire_identity(provider, continuation_token).await;
        Self::connect(collection, outcome, store).await
    }

    /// Build the engine for an acquired identity and open the subscription
    ///
    /// A failed subscription does not stop the session; the failure is kept
    /// as the startup error and the collection stays unloaded.
    pub async fn connect(collection: impl Into<String>, outcome: IdentityOutcome, store: Arc<dyn RemoteStore>) -> Arc<Self> {
        let collection = collection.into();
        debug!(%collection, user_id = %outcome.identity.user_id, "SessionContext::connect: called");
        if outcome.is_degraded() {
            warn!(warning = outcome.warning.as_deref().unwrap_or_default(), "Session running on a local identity");
        }

        let engine = Arc::new(SyncEngine::new(store, collection, outcome.identity.clone()));
        let startup_error = match engine.subscribe().await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "SessionContext::connect: subscription failed");
                Some(e.to_string())
            }
        };

        info!(user_id = %outcome.identity.user_id, shared = outcome.identity.is_shared(), "Session started");
        Arc::new(Self {
            outcome,
            engine,
            startup_error,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.outcome.identity
    }

    /// Warning to show when the identity is degraded
    pub fn identity_warning(&self) -> Option<&str> {
        self.outcome.warning.as_deref()
    }

    pub fn startup_error(&self) -> Option<&str> {
        self.startup_error.as_deref()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// End the session: cancel the standing subscription
    pub async fn teardown(&self) {
        debug!("SessionContext::teardown: called");
        self.engine.unsubscribe().await;
        info!("Session ended");
    }
}
