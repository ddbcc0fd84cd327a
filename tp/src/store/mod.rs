//! Remote store boundary
//!
//! The hosted realtime document store is reached through [`RemoteStore`]:
//! merge writes, deletes, and a standing subscription that pushes the full
//! collection as a [`StoreEvent::Snapshot`] on every change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

mod error;
mod http;
mod memory;
mod mirror;

pub use error::StoreError;
pub use http::HttpRemoteStore;
pub use memory::InMemoryStore;
pub use mirror::Mirror;

use crate::config::{StoreBackend, StoreConfig};
use crate::identity::Identity;

/// Raw documents of one collection, keyed by document key
pub type Documents = BTreeMap<String, Value>;

/// What a subscription delivers
#[derive(Debug)]
pub enum StoreEvent {
    /// The whole collection as it stands after a change
    Snapshot(Documents),
    /// The subscription failed or was interrupted
    Error(StoreError),
}

/// Cancels a standing subscription when unsubscribed or dropped
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving events
    pub fn unsubscribe(mut self) {
        debug!("SubscriptionHandle::unsubscribe: called");
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!("SubscriptionHandle::drop: cancelling subscription");
            cancel();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Hosted realtime document store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a standing subscription to a whole collection
    ///
    /// Events are delivered to `sink` in the order the store produces them
    /// until the returned handle is unsubscribed or dropped.
    async fn subscribe(
        &self,
        collection: &str,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Merge `fields` into the document at `key`, leaving other fields untouched
    async fn write_merge(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete the document at `key`
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;
}

/// Create the remote store selected in config
///
/// The identity's credential, if any, authorizes HTTP requests.
pub fn create_store(config: &StoreConfig, identity: &Identity) -> Result<Arc<dyn RemoteStore>, StoreError> {
    debug!(backend = ?config.backend, "create_store: called");
    match config.backend {
        StoreBackend::Http => Ok(Arc::new(HttpRemoteStore::from_config(
            config,
            identity.credential.clone(),
        )?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
    }
}
