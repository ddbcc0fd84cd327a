//! SyncEngine - owns the live plan mirror
//!
//! One pump task per subscription is the only writer of the mirror. Readers
//! get a `watch::Receiver` and always observe whole snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{SyncError, SyncEvent, SyncResponse};
use crate::domain::{DayKey, Plan, PlanCollection, PlanPatch};
use crate::identity::Identity;
use crate::store::{Documents, RemoteStore, StoreError, StoreEvent, SubscriptionHandle};

/// Broadcast capacity for sync events
const EVENT_CHANNEL_CAPACITY: usize = 64;

struct ActiveSubscription {
    handle: Option<SubscriptionHandle>,
    pump: JoinHandle<()>,
}

impl ActiveSubscription {
    /// False once the store has ended the stream and the pump has exited
    fn is_live(&self) -> bool {
        !self.pump.is_finished()
    }
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        self.pump.abort();
        if let Some(handle) = self.handle.take() {
            handle.unsubscribe();
        }
    }
}

/// Live mirror of one remote plan collection
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    collection: String,
    identity: Identity,
    plans_tx: Arc<watch::Sender<Arc<PlanCollection>>>,
    event_tx: broadcast::Sender<SyncEvent>,
    subscription: Mutex<Option<ActiveSubscription>>,
    next_write_id: AtomicU64,
}

/// One remote mutation, run to completion on its own task
enum WriteOp {
    Merge(Map<String, Value>),
    Delete,
}

impl SyncEngine {
    /// Create an engine for `collection`
    ///
    /// Taking the identity here means nothing can subscribe or write before
    /// the session identity exists.
    pub fn new(store: Arc<dyn RemoteStore>, collection: impl Into<String>, identity: Identity) -> Self {
        let collection = collection.into();
        debug!(%collection, user_id = %identity.user_id, "SyncEngine::new: called");
        let (plans_tx, _) = watch::channel(Arc::new(PlanCollection::empty()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            collection,
            identity,
            plans_tx: Arc::new(plans_tx),
            event_tx,
            subscription: Mutex::new(None),
            next_write_id: AtomicU64::new(1),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn collection_path(&self) -> &str {
        &self.collection
    }

    /// Observe the plan collection
    pub fn plans(&self) -> watch::Receiver<Arc<PlanCollection>> {
        self.plans_tx.subscribe()
    }

    /// Current plan collection
    pub fn current(&self) -> Arc<PlanCollection> {
        self.plans_tx.borrow().clone()
    }

    /// Subscribe to engine events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// True while a subscription is open and still delivering
    pub async fn is_subscribed(&self) -> bool {
        self.subscription.lock().await.as_ref().is_some_and(ActiveSubscription::is_live)
    }

    /// Open the standing subscription to the remote collection
    ///
    /// Calling this while subscribed does nothing. A subscription the store
    /// has ended is replaced with a fresh one. A failure is also
    /// broadcast as [`SyncEvent::SubscriptionFailed`]; the current collection
    /// is left as it was.
    pub async fn subscribe(&self) -> SyncResponse<()> {
        debug!(collection = %self.collection, "subscribe: called");
        let mut active = self.subscription.lock().await;
        match active.as_ref() {
            Some(current) if current.is_live() => {
                debug!("subscribe: already subscribed");
                return Ok(());
            }
            Some(_) => {
                info!(collection = %self.collection, "Reopening ended plan subscription");
                *active = None;
            }
            None => {}
        }

        let (sink, rx) = mpsc::unbounded_channel();
        let handle = match self.store.subscribe(&self.collection, sink).await {
            Ok(handle) => handle,
            Err(source) => {
                warn!(collection = %self.collection, error = %source, "subscribe: failed");
                let err = SyncError::Subscribe {
                    collection: self.collection.clone(),
                    source,
                };
                let _ = self.event_tx.send(SyncEvent::SubscriptionFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let pump = tokio::spawn(snapshot_loop(rx, self.plans_tx.clone(), self.event_tx.clone()));
        *active = Some(ActiveSubscription {
            handle: Some(handle),
            pump,
        });

        info!(collection = %self.collection, "Plan subscription opened");
        Ok(())
    }

    /// Cancel the standing subscription; the last collection stays readable
    pub async fn unsubscribe(&self) {
        debug!(collection = %self.collection, "unsubscribe: called");
        if self.subscription.lock().await.take().is_some() {
            info!(collection = %self.collection, "Plan subscription closed");
        }
    }

    /// Merge-write a plan
    ///
    /// Only the fields present in `patch` change remotely; `lastUpdatedBy`
    /// and `timestamp` are always stamped. The local collection is not
    /// touched: the change shows up with the next pushed snapshot.
    pub async fn upsert(&self, date_key: DayKey, patch: PlanPatch) -> SyncResponse<()> {
        debug!(%date_key, ?patch, "upsert: called");
        let fields = patch.into_fields(&self.identity.user_id, Utc::now());
        self.run_write(date_key, WriteOp::Merge(fields)).await
    }

    /// Delete a plan
    ///
    /// The key disappears from the collection when the store pushes the
    /// snapshot without it.
    pub async fn remove(&self, date_key: DayKey) -> SyncResponse<()> {
        debug!(%date_key, "remove: called");
        self.run_write(date_key, WriteOp::Delete).await
    }

    /// Run a write on its own task and wait for it
    ///
    /// Dropping the returned future does not cancel the write. A failure is
    /// broadcast as [`SyncEvent::WriteFailed`] either way, so an observer
    /// that stopped waiting still learns about it.
    async fn run_write(&self, date_key: DayKey, op: WriteOp) -> SyncResponse<()> {
        let write_id = self.next_write_id.fetch_add(1, Ordering::Relaxed);
        debug!(write_id, %date_key, "run_write: called");
        let store = self.store.clone();
        let collection = self.collection.clone();
        let event_tx = self.event_tx.clone();

        let task = tokio::spawn(async move {
            let key = date_key.to_string();
            let result = match op {
                WriteOp::Merge(fields) => store
                    .write_merge(&collection, &key, fields)
                    .await
                    .map_err(|source| SyncError::Write {
                        write_id,
                        date_key,
                        source,
                    }),
                WriteOp::Delete => store
                    .delete(&collection, &key)
                    .await
                    .map_err(|source| SyncError::Delete {
                        write_id,
                        date_key,
                        source,
                    }),
            };
            if let Err(e) = &result {
                warn!(write_id, %date_key, error = %e, "run_write: write failed");
                let _ = event_tx.send(SyncEvent::WriteFailed {
                    write_id,
                    date_key,
                    message: e.to_string(),
                });
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(write_id, %date_key, error = %e, "run_write: write task did not complete");
                Err(SyncError::Write {
                    write_id,
                    date_key,
                    source: StoreError::Unavailable(format!("write task ended early: {}", e)),
                })
            }
        }
    }
}

/// Decode a raw snapshot, skipping documents that do not decode
fn decode_snapshot(revision: u64, docs: &Documents) -> (PlanCollection, usize) {
    debug!(revision, doc_count = docs.len(), "decode_snapshot: called");
    let mut skipped = 0;
    let plans: Vec<Plan> = docs
        .iter()
        .filter_map(|(key, doc)| match Plan::from_document(key, doc) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(%key, error = %e, "decode_snapshot: skipping document");
                skipped += 1;
                None
            }
        })
        .collect();

    (PlanCollection::from_snapshot(revision, plans), skipped)
}

/// Apply pushed snapshots in delivery order until the subscription ends
async fn snapshot_loop(
    mut rx: mpsc::UnboundedReceiver<StoreEvent>,
    plans_tx: Arc<watch::Sender<Arc<PlanCollection>>>,
    event_tx: broadcast::Sender<SyncEvent>,
) {
    debug!("snapshot_loop: called");
    let mut revision = plans_tx.borrow().revision();

    while let Some(event) = rx.recv().await {
        match event {
            StoreEvent::Snapshot(docs) => {
                revision += 1;
                let (collection, skipped) = decode_snapshot(revision, &docs);
                let plan_count = collection.len();
                plans_tx.send_replace(Arc::new(collection));
                debug!(revision, plan_count, skipped, "snapshot_loop: snapshot applied");
                let _ = event_tx.send(SyncEvent::SnapshotApplied {
                    revision,
                    plan_count,
                    skipped,
                });
            }
            StoreEvent::Error(e) => {
                warn!(error = %e, "snapshot_loop: subscription error, keeping previous plans");
                let _ = event_tx.send(SyncEvent::SubscriptionFailed {
                    message: format!("Live updates interrupted: {}", e),
                });
            }
        }
    }

    info!("Plan subscription ended by the store");
    let _ = event_tx.send(SyncEvent::SubscriptionClosed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityOrigin;
    use crate::store::InMemoryStore;
    use serde_json::{Value, json};
    use std::time::Duration;

    const COLLECTION: &str = "trip/plans";

    fn key(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn engine(store: &InMemoryStore, user: &str) -> SyncEngine {
        SyncEngine::new(
            Arc::new(store.clone()),
            COLLECTION,
            Identity::new(user, IdentityOrigin::Anonymous),
        )
    }

    async fn wait_for_revision(engine: &SyncEngine, revision: u64) -> Arc<PlanCollection> {
        let mut rx = engine.plans();
        let plans = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|c| c.revision() >= revision))
            .await
            .expect("timed out waiting for snapshot")
            .expect("engine dropped")
            .clone();
        plans
    }

    #[tokio::test]
    async fn test_first_snapshot_marks_loaded() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        assert!(!engine.current().is_loaded());

        engine.subscribe().await.unwrap();
        let plans = wait_for_revision(&engine, 1).await;
        assert!(plans.is_loaded());
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_arrives_via_snapshot_with_stamp() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        engine.subscribe().await.unwrap();
        wait_for_revision(&engine, 1).await;

        engine
            .upsert(key("2024-07-04"), PlanPatch::default().with_title("Fireworks"))
            .await
            .unwrap();
        let plans = wait_for_revision(&engine, 2).await;
        let plan = plans.get(&key("2024-07-04")).unwrap();
        assert_eq!(plan.title(), "Fireworks");
        assert_eq!(plan.last_updated_by, "u1");
        assert!(plans.has_visible_plan(&key("2024-07-04")));
    }

    #[tokio::test]
    async fn test_title_only_upsert_keeps_description() {
        let store = InMemoryStore::new();
        let alice = engine(&store, "alice");
        let bob = engine(&store, "bob");
        alice.subscribe().await.unwrap();

        alice
            .upsert(key("2024-07-04"), PlanPatch::full("Fireworks", "Pier 39"))
            .await
            .unwrap();
        bob.upsert(key("2024-07-04"), PlanPatch::default().with_title("Fireworks!"))
            .await
            .unwrap();

        let plans = wait_for_revision(&alice, 3).await;
        let plan = plans.get(&key("2024-07-04")).unwrap();
        assert_eq!(plan.title(), "Fireworks!");
        assert_eq!(plan.description(), "Pier 39");
        assert_eq!(plan.last_updated_by, "bob");
    }

    #[tokio::test]
    async fn test_no_optimistic_update_before_push() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        engine.subscribe().await.unwrap();
        wait_for_revision(&engine, 1).await;

        store.pause_delivery();
        engine
            .upsert(key("2024-07-04"), PlanPatch::full("A", ""))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(!engine.current().contains(&key("2024-07-04")));

        store.resume_delivery();
        let plans = wait_for_revision(&engine, 2).await;
        assert!(plans.contains(&key("2024-07-04")));
    }

    #[tokio::test]
    async fn test_remove_applies_on_next_snapshot() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        engine.subscribe().await.unwrap();
        engine
            .upsert(key("2024-07-04"), PlanPatch::full("A", "B"))
            .await
            .unwrap();
        wait_for_revision(&engine, 2).await;

        engine.remove(key("2024-07-04")).await.unwrap();
        let plans = wait_for_revision(&engine, 3).await;
        assert!(!plans.contains(&key("2024-07-04")));
    }

    #[tokio::test]
    async fn test_write_failure_reports_and_leaves_collection() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();
        engine.subscribe().await.unwrap();
        let before = wait_for_revision(&engine, 1).await;
        while events.try_recv().is_ok() {}

        store.set_fail_writes(Some("offline"));
        let err = engine
            .upsert(key("2024-07-04"), PlanPatch::full("A", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Write { .. }));
        assert!(err.to_string().contains("offline"));
        assert_eq!(*engine.current(), *before);

        match events.recv().await.unwrap() {
            SyncEvent::WriteFailed { date_key, .. } => assert_eq!(date_key, key("2024-07-04")),
            other => panic!("Expected WriteFailed, got {:?}", other),
        }

        assert!(matches!(
            engine.remove(key("2024-07-04")).await,
            Err(SyncError::Delete { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscription_error_keeps_stale_plans() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();
        engine.subscribe().await.unwrap();
        engine
            .upsert(key("2024-07-04"), PlanPatch::full("A", ""))
            .await
            .unwrap();
        wait_for_revision(&engine, 2).await;
        while events.try_recv().is_ok() {}

        store.interrupt(COLLECTION, "connection reset");
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap() {
            SyncEvent::SubscriptionFailed { message } => assert!(message.contains("connection reset")),
            other => panic!("Expected SubscriptionFailed, got {:?}", other),
        }
        assert!(engine.current().contains(&key("2024-07-04")));
        assert_eq!(engine.current().revision(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_reported() {
        let store = InMemoryStore::new();
        store.set_fail_subscribe(Some("permission denied"));
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();

        let err = engine.subscribe().await.unwrap_err();
        assert!(matches!(err, SyncError::Subscribe { .. }));
        assert!(!engine.is_subscribed().await);
        assert!(matches!(events.try_recv().unwrap(), SyncEvent::SubscriptionFailed { .. }));
        assert!(!engine.current().is_loaded());
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_noop_and_unsubscribe_detaches() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        engine.subscribe().await.unwrap();
        engine.subscribe().await.unwrap();
        assert_eq!(store.subscriber_count(), 1);

        engine.unsubscribe().await;
        assert!(!engine.is_subscribed().await);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_ended_subscription_can_be_reopened() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();
        engine.subscribe().await.unwrap();
        wait_for_revision(&engine, 1).await;

        store.disconnect(COLLECTION, "rules changed");
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(SyncEvent::SubscriptionClosed) = events.recv().await {
                    break;
                }
            }
        })
        .await
        .expect("subscription should report closing");
        tokio::time::timeout(Duration::from_secs(2), async {
            while engine.is_subscribed().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("ended subscription should not count as live");
        assert_eq!(store.subscriber_count(), 0);

        engine.subscribe().await.unwrap();
        assert!(engine.is_subscribed().await);
        assert_eq!(store.subscriber_count(), 1);
        let plans = wait_for_revision(&engine, 2).await;
        assert!(plans.is_loaded());
    }

    #[tokio::test]
    async fn test_dropped_upsert_still_completes() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();
        store.set_write_delay(Some(Duration::from_millis(100)));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            engine.upsert(key("2024-07-04"), PlanPatch::default().with_title("A")),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.document(COLLECTION, "2024-07-04").unwrap()["title"], "A");

        store.set_fail_writes(Some("offline"));
        let abandoned = tokio::time::timeout(Duration::from_millis(10), engine.remove(key("2024-07-04"))).await;
        assert!(abandoned.is_err());
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap() {
            SyncEvent::WriteFailed { date_key, message, .. } => {
                assert_eq!(date_key, key("2024-07-04"));
                assert!(message.contains("offline"));
            }
            other => panic!("Expected WriteFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_error_carries_event_id() {
        let store = InMemoryStore::new();
        let engine = engine(&store, "u1");
        let mut events = engine.subscribe_events();
        store.set_fail_writes(Some("offline"));

        let err = engine
            .upsert(key("2024-07-04"), PlanPatch::default().with_title("A"))
            .await
            .unwrap_err();
        match events.try_recv().unwrap() {
            SyncEvent::WriteFailed { write_id, .. } => assert_eq!(err.write_id(), Some(write_id)),
            other => panic!("Expected WriteFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_snapshot_skips_bad_documents() {
        let mut docs = Documents::new();
        docs.insert("2024-07-04".to_string(), json!({"title": "A", "lastUpdatedBy": "u1"}));
        docs.insert("bogus".to_string(), json!({"title": "B", "lastUpdatedBy": "u1"}));
        docs.insert("2024-07-05".to_string(), Value::String("not a document".to_string()));

        let (collection, skipped) = decode_snapshot(7, &docs);
        assert_eq!(collection.len(), 1);
        assert_eq!(skipped, 2);
        assert_eq!(collection.revision(), 7);
    }
}
