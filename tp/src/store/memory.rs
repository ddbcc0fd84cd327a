//! In-process document store
//!
//! Field-merging store that pushes the whole collection to every subscriber
//! after each change. Used for single-process sessions and as the test double
//! for the hosted store, with switches to inject failures and to hold back
//! push notifications.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{Documents, RemoteStore, StoreError, StoreEvent, SubscriptionHandle};

struct Subscriber {
    id: u64,
    collection: String,
    sink: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    fail_writes: Option<String>,
    fail_subscribe: Option<String>,
    delivery_paused: bool,
    write_delay: Option<Duration>,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Documents {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(k, v)| (k.clone(), Value::Object(v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push the current collection to its subscribers, dropping closed ones
    fn publish(&mut self, collection: &str) {
        if self.delivery_paused {
            debug!(%collection, "InMemoryStore::publish: delivery paused");
            return;
        }
        let snapshot = self.snapshot(collection);
        self.subscribers.retain(|s| {
            if s.collection != collection {
                return true;
            }
            s.sink.send(StoreEvent::Snapshot(snapshot.clone())).is_ok()
        });
    }
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Make every following write and delete fail with `message` (None clears)
    pub fn set_fail_writes(&self, message: Option<&str>) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_writes = message.map(str::to_string);
        }
    }

    /// Make every following subscribe fail with `message` (None clears)
    pub fn set_fail_subscribe(&self, message: Option<&str>) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_subscribe = message.map(str::to_string);
        }
    }

    /// Make every following write and delete take `delay` before it applies (None clears)
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        if let Ok(mut inner) = self.lock() {
            inner.write_delay = delay;
        }
    }

    /// Hold back push notifications; writes still apply
    pub fn pause_delivery(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.delivery_paused = true;
        }
    }

    /// Resume push notifications and deliver the current state of every
    /// subscribed collection
    pub fn resume_delivery(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.delivery_paused = false;
            let collections: BTreeSet<String> = inner.subscribers.iter().map(|s| s.collection.clone()).collect();
            for collection in collections {
                inner.publish(&collection);
            }
        }
    }

    /// Send an interruption error to every subscriber of `collection`
    pub fn interrupt(&self, collection: &str, message: &str) {
        info!(%collection, %message, "InMemoryStore: interrupting subscribers");
        if let Ok(inner) = self.lock() {
            for s in inner.subscribers.iter().filter(|s| s.collection == collection) {
                let _ = s.sink.send(StoreEvent::Error(StoreError::Stream(message.to_string())));
            }
        }
    }

    /// End every subscription to `collection` with an error, as a server
    /// closing the stream for good would
    pub fn disconnect(&self, collection: &str, message: &str) {
        info!(%collection, %message, "InMemoryStore: disconnecting subscribers");
        if let Ok(mut inner) = self.lock() {
            inner.subscribers.retain(|s| {
                if s.collection != collection {
                    return true;
                }
                let _ = s.sink.send(StoreEvent::Error(StoreError::Cancelled(message.to_string())));
                false
            });
        }
    }

    async fn delay_write(&self) {
        let delay = self.lock().ok().and_then(|inner| inner.write_delay);
        if let Some(delay) = delay {
            debug!(?delay, "InMemoryStore: delaying write");
            tokio::time::sleep(delay).await;
        }
    }

    /// Stored document, as the server sees it
    pub fn document(&self, collection: &str, key: &str) -> Option<Map<String, Value>> {
        self.lock()
            .ok()
            .and_then(|inner| inner.collections.get(collection).and_then(|c| c.get(key).cloned()))
    }

    /// Number of open subscriptions across all collections
    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|inner| inner.subscribers.len()).unwrap_or(0)
    }
}

fn remove_subscriber(inner: &Weak<Mutex<Inner>>, id: u64) {
    if let Some(inner) = inner.upgrade()
        && let Ok(mut inner) = inner.lock()
    {
        inner.subscribers.retain(|s| s.id != id);
        debug!(id, "InMemoryStore: subscriber removed");
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn subscribe(
        &self,
        collection: &str,
        sink: mpsc::UnboundedSender<StoreEvent>,
    ) -> Result<SubscriptionHandle, StoreError> {
        debug!(%collection, "InMemoryStore::subscribe: called");
        let mut inner = self.lock()?;
        if let Some(message) = &inner.fail_subscribe {
            return Err(StoreError::PermissionDenied(message.clone()));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        if !inner.delivery_paused {
            let _ = sink.send(StoreEvent::Snapshot(inner.snapshot(collection)));
        }
        inner.subscribers.push(Subscriber {
            id,
            collection: collection.to_string(),
            sink,
        });

        let weak = Arc::downgrade(&self.inner);
        Ok(SubscriptionHandle::new(move || remove_subscriber(&weak, id)))
    }

    async fn write_merge(&self, collection: &str, key: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        debug!(%collection, %key, field_count = fields.len(), "InMemoryStore::write_merge: called");
        self.delay_write().await;
        let mut inner = self.lock()?;
        if let Some(message) = &inner.fail_writes {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let document = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();
        for (field, value) in fields {
            document.insert(field, value);
        }

        inner.publish(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        debug!(%collection, %key, "InMemoryStore::delete: called");
        self.delay_write().await;
        let mut inner = self.lock()?;
        if let Some(message) = &inner.fail_writes {
            return Err(StoreError::Unavailable(message.clone()));
        }

        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(key))
            .is_some();
        if removed {
            inner.publish(collection);
        } else {
            debug!(%key, "InMemoryStore::delete: document did not exist");
        }
        Ok(())
    }
}
