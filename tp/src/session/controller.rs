//! PlannerSession - user intents in, session state out
//!
//! The rendering layer owns one `PlannerSession`, calls the intent methods,
//! and reads [`SessionState`] plus the current plan collection to draw.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::context::SessionContext;
use super::error::SessionError;
use super::report::{ReportEntry, ValidationError, build_report};
use super::state::{Draft, SessionState, ViewMode};
use crate::domain::{DayKey, PlanCollection};
use crate::identity::Identity;
use crate::sync::{SyncError, SyncEvent};

pub struct PlannerSession {
    context: Arc<SessionContext>,
    plans: watch::Receiver<Arc<PlanCollection>>,
    events: broadcast::Receiver<SyncEvent>,
    state: SessionState,
    /// Failed writes whose error the awaiting operation already recorded
    reported_writes: HashSet<u64>,
}

impl PlannerSession {
    /// Session showing the current local month
    pub fn new(context: Arc<SessionContext>) -> Self {
        Self::with_today(context, DayKey::today().to_date())
    }

    /// Session showing the month containing `today`
    pub fn with_today(context: Arc<SessionContext>, today: NaiveDate) -> Self {
        debug!(%today, "PlannerSession::with_today: called");
        let plans = context.engine().plans();
        let events = context.engine().subscribe_events();
        let mut state = SessionState::new(today);
        state.warning_message = context.identity_warning().map(str::to_string);
        state.error_message = context.startup_error().map(str::to_string);

        Self {
            context,
            plans,
            events,
            state,
            reported_writes: HashSet::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn identity(&self) -> &Identity {
        self.context.identity()
    }

    /// Latest applied snapshot
    pub fn plans(&self) -> Arc<PlanCollection> {
        self.plans.borrow().clone()
    }

    /// True once identity is set and the first snapshot has arrived
    ///
    /// Identity is always set once a context exists, so this tracks the
    /// first snapshot.
    pub fn is_ready(&self) -> bool {
        self.plans.borrow().is_loaded()
    }

    /// Wait for the first snapshot, up to `timeout`
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), SessionError> {
        debug!(?timeout, "wait_ready: called");
        match tokio::time::timeout(timeout, self.plans.wait_for(|c| c.is_loaded())).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(SessionError::NotReady),
        }
    }

    /// Wait for the next applied snapshot; None once the engine is gone
    pub async fn next_snapshot(&mut self) -> Option<Arc<PlanCollection>> {
        self.plans.changed().await.ok()?;
        Some(self.plans.borrow_and_update().clone())
    }

    /// Grid-highlight predicate
    pub fn has_plan(&self, date: NaiveDate) -> bool {
        self.plans.borrow().has_visible_plan(&DayKey::from_date(date))
    }

    /// Days of the navigation month with their highlight flag
    pub fn month_grid(&self) -> Vec<(DayKey, bool)> {
        let plans = self.plans.borrow();
        self.state
            .nav_month
            .days()
            .into_iter()
            .map(|key| (key, plans.has_visible_plan(&key)))
            .collect()
    }

    /// Open the edit dialog for `date`, preloading its plan if there is one
    pub fn select_date(&mut self, date: NaiveDate) {
        let key = DayKey::from_date(date);
        debug!(%key, "select_date: called");
        self.state.draft = match self.plans.borrow().get(&key) {
            Some(plan) => Draft::from_plan(plan),
            None => Draft::blank(),
        };
        self.state.selected_date = Some(date);
        self.state.view = ViewMode::EditModal;
    }

    pub fn set_draft_title(&mut self, title: impl Into<String>) {
        self.state.draft.title = title.into();
    }

    pub fn set_draft_description(&mut self, description: impl Into<String>) {
        self.state.draft.description = description.into();
    }

    /// Save the draft for the selected date
    ///
    /// On success the dialog closes. On failure the error is recorded and
    /// the dialog stays open with the draft intact.
    pub async fn commit_draft(&mut self) -> Result<(), SessionError> {
        debug!(selected = ?self.state.selected_date, "commit_draft: called");
        let Some(date) = self.state.selected_date else {
            return self.fail(SessionError::NoDateSelected);
        };
        if !self.is_ready() {
            return self.fail(SessionError::NotReady);
        }

        let key = DayKey::from_date(date);
        if !self.state.draft.is_dirty() {
            debug!(%key, "commit_draft: nothing changed, closing without a write");
            self.close_editor();
            return Ok(());
        }

        let patch = self.state.draft.to_patch();
        match self.context.engine().upsert(key, patch).await {
            Ok(()) => {
                info!(%key, "Plan saved");
                self.close_editor();
                Ok(())
            }
            Err(e) => self.fail_write(e),
        }
    }

    /// Delete the plan for the selected date
    pub async fn delete_selected(&mut self) -> Result<(), SessionError> {
        debug!(selected = ?self.state.selected_date, "delete_selected: called");
        let Some(date) = self.state.selected_date else {
            return self.fail(SessionError::NoDateSelected);
        };
        if !self.is_ready() {
            return self.fail(SessionError::NotReady);
        }

        let key = DayKey::from_date(date);
        if !self.plans.borrow().contains(&key) {
            return self.fail(SessionError::NoPlanToDelete(key.to_string()));
        }

        match self.context.engine().remove(key).await {
            Ok(()) => {
                info!(%key, "Plan deleted");
                self.close_editor();
                Ok(())
            }
            Err(e) => self.fail_write(e),
        }
    }

    /// Close the edit dialog without writing
    pub fn cancel_edit(&mut self) {
        debug!("cancel_edit: called");
        self.state.selected_date = None;
        self.state.draft = Draft::blank();
        self.state.view = ViewMode::Grid;
    }

    pub fn navigate_month(&mut self, delta: i32) {
        debug!(delta, "navigate_month: called");
        self.state.nav_month = self.state.nav_month.shift(delta);
    }

    /// Open the live subscription again after it failed or was ended
    ///
    /// Does nothing while a subscription is still delivering.
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        debug!("reconnect: called");
        match self.context.engine().subscribe().await {
            Ok(()) => {
                self.state.clear_error();
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Report over the current plans; no I/O
    pub fn build_report(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ReportEntry>, ValidationError> {
        build_report(&self.plans.borrow(), start, end)
    }

    pub fn open_print_picker(&mut self) {
        debug!("open_print_picker: called");
        self.state.view = ViewMode::PrintRangePicker;
    }

    pub fn set_print_range(&mut self, start: NaiveDate, end: NaiveDate) {
        debug!(%start, %end, "set_print_range: called");
        self.state.print_start = Some(start);
        self.state.print_end = Some(end);
    }

    /// Build the report for the chosen range and show it
    ///
    /// On a validation failure the picker stays open with the error set.
    pub fn show_report(&mut self) -> Result<(), SessionError> {
        debug!(start = ?self.state.print_start, end = ?self.state.print_end, "show_report: called");
        let (Some(start), Some(end)) = (self.state.print_start, self.state.print_end) else {
            return self.fail(ValidationError::MissingBounds.into());
        };

        match self.build_report(start, end) {
            Ok(report) => {
                self.state.report = report;
                self.state.view = ViewMode::PrintReport;
                self.state.clear_error();
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn close_report(&mut self) {
        debug!("close_report: called");
        self.state.report.clear();
        self.state.view = ViewMode::Grid;
    }

    /// Drain pending sync events into session state
    ///
    /// Subscription failures become the visible error, as does a write
    /// failure no awaiting operation saw (its future was dropped).
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    handled += 1;
                    self.apply_event(&event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "pump_events: missed sync events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        handled
    }

    /// Wait for the next sync event and apply it; None once the engine is gone
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.apply_event(&event);
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "next_event: missed sync events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn apply_event(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::SnapshotApplied {
                revision,
                plan_count,
                skipped,
            } => {
                debug!(revision, plan_count, skipped, "apply_event: snapshot");
            }
            SyncEvent::SubscriptionFailed { message } => {
                self.state.set_error(message.clone());
            }
            SyncEvent::SubscriptionClosed => {
                if self.state.error_message.is_none() {
                    self.state.set_error("Live updates stopped; reconnect to resume");
                }
            }
            SyncEvent::WriteFailed {
                write_id,
                date_key,
                message,
            } => {
                if self.reported_writes.remove(write_id) {
                    debug!(write_id, %date_key, "apply_event: write failure already recorded");
                } else {
                    self.state.set_error(message.clone());
                }
            }
        }
    }

    fn close_editor(&mut self) {
        self.state.clear_error();
        self.state.selected_date = None;
        self.state.draft = Draft::blank();
        self.state.view = ViewMode::Grid;
    }

    fn fail_write(&mut self, err: SyncError) -> Result<(), SessionError> {
        if let Some(write_id) = err.write_id() {
            self.reported_writes.insert(write_id);
        }
        self.fail(err.into())
    }

    fn fail(&mut self, err: SessionError) -> Result<(), SessionError> {
        warn!(error = %err, view = self.state.view.display_name(), "Session action failed");
        self.state.set_error(err.to_string());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityOrigin, IdentityOutcome};
    use crate::store::InMemoryStore;

    const COLLECTION: &str = "trip/plans";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn session(store: &InMemoryStore, user: &str) -> PlannerSession {
        let outcome = IdentityOutcome {
            identity: Identity::new(user, IdentityOrigin::Anonymous),
            warning: None,
        };
        let ctx = SessionContext::connect(COLLECTION, outcome, Arc::new(store.clone())).await;
        let mut session = PlannerSession::with_today(ctx, date(2024, 7, 1));
        session.wait_ready(Duration::from_secs(2)).await.unwrap();
        session
    }

    async fn wait_until(session: &mut PlannerSession, pred: impl Fn(&PlanCollection) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !pred(session.plans().as_ref()) {
                session.next_snapshot().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_select_empty_date_opens_blank_editor() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;

        s.select_date(date(2024, 7, 4));
        assert_eq!(s.state().view, ViewMode::EditModal);
        assert_eq!(s.state().draft, Draft::blank());
        assert_eq!(s.state().selected_key().unwrap().to_string(), "2024-07-04");
    }

    #[tokio::test]
    async fn test_fireworks_commit() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        assert!(!s.has_plan(date(2024, 7, 4)));

        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        s.commit_draft().await.unwrap();
        assert_eq!(s.state().view, ViewMode::Grid);
        assert!(s.state().error_message.is_none());

        wait_until(&mut s, |c| c.contains(&DayKey::parse("2024-07-04").unwrap())).await;
        assert!(s.has_plan(date(2024, 7, 4)));
        let doc = store.document(COLLECTION, "2024-07-04").unwrap();
        assert_eq!(doc["title"], "Fireworks");
        assert!(doc.get("description").is_none());
        assert_eq!(doc["lastUpdatedBy"], "u1");

        s.select_date(date(2024, 7, 4));
        assert_eq!(s.state().draft.title, "Fireworks");
        assert!(s.state().draft.is_existing());
    }

    #[tokio::test]
    async fn test_delete_selected() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        s.commit_draft().await.unwrap();
        wait_until(&mut s, |c| c.len() == 1).await;

        s.select_date(date(2024, 7, 4));
        s.delete_selected().await.unwrap();
        assert_eq!(s.state().view, ViewMode::Grid);
        wait_until(&mut s, |c| c.is_empty()).await;
        assert!(!s.has_plan(date(2024, 7, 4)));
        assert!(store.document(COLLECTION, "2024-07-04").is_none());
    }

    #[tokio::test]
    async fn test_delete_without_plan_is_rejected() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.select_date(date(2024, 7, 9));

        let err = s.delete_selected().await.unwrap_err();
        assert!(matches!(err, SessionError::NoPlanToDelete(_)));
        assert!(s.state().error_message.is_some());
        assert_eq!(s.state().view, ViewMode::EditModal);
    }

    #[tokio::test]
    async fn test_commit_without_selection_fails() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        assert!(matches!(s.commit_draft().await, Err(SessionError::NoDateSelected)));
        assert!(s.state().error_message.is_some());
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_modal_open() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        store.set_fail_writes(Some("network unreachable"));

        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        let err = s.commit_draft().await.unwrap_err();
        assert!(matches!(err, SessionError::Sync(_)));
        assert_eq!(s.state().view, ViewMode::EditModal);
        assert_eq!(s.state().draft.title, "Fireworks");
        assert!(
            s.state()
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("network unreachable"))
        );

        store.set_fail_writes(None);
        s.commit_draft().await.unwrap();
        assert!(s.state().error_message.is_none());
        assert_eq!(s.state().view, ViewMode::Grid);
    }

    #[tokio::test]
    async fn test_commit_before_first_snapshot_is_not_ready() {
        let store = InMemoryStore::new();
        store.set_fail_subscribe(Some("offline"));
        let outcome = IdentityOutcome {
            identity: Identity::new("u1", IdentityOrigin::Anonymous),
            warning: None,
        };
        let ctx = SessionContext::connect(COLLECTION, outcome, Arc::new(store.clone())).await;
        let mut s = PlannerSession::with_today(ctx, date(2024, 7, 1));
        assert!(!s.is_ready());
        assert!(s.state().error_message.is_some());

        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        assert!(matches!(s.commit_draft().await, Err(SessionError::NotReady)));
        assert!(store.document(COLLECTION, "2024-07-04").is_none());
    }

    #[tokio::test]
    async fn test_cancel_edit_writes_nothing() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Never saved");
        s.cancel_edit();

        assert_eq!(s.state().view, ViewMode::Grid);
        assert!(s.state().selected_date.is_none());
        assert!(store.document(COLLECTION, "2024-07-04").is_none());
    }

    #[tokio::test]
    async fn test_print_flow() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        for (day, title) in [(1, "Hike"), (5, "Beach")] {
            s.select_date(date(2024, 7, day));
            s.set_draft_title(title);
            s.commit_draft().await.unwrap();
        }
        wait_until(&mut s, |c| c.len() == 2).await;

        s.open_print_picker();
        assert_eq!(s.state().view, ViewMode::PrintRangePicker);
        assert!(matches!(s.show_report(), Err(SessionError::Validation(ValidationError::MissingBounds))));

        s.set_print_range(date(2024, 7, 3), date(2024, 7, 1));
        assert!(matches!(
            s.show_report(),
            Err(SessionError::Validation(ValidationError::EndBeforeStart { .. }))
        ));
        assert_eq!(s.state().view, ViewMode::PrintRangePicker);

        s.set_print_range(date(2024, 7, 1), date(2024, 7, 3));
        s.show_report().unwrap();
        assert_eq!(s.state().view, ViewMode::PrintReport);
        assert_eq!(s.state().report.len(), 1);
        assert_eq!(s.state().report[0].plan.title(), "Hike");
        assert!(s.state().error_message.is_none());

        s.close_report();
        assert_eq!(s.state().view, ViewMode::Grid);
        assert!(s.state().report.is_empty());
    }

    #[tokio::test]
    async fn test_navigate_month_and_grid() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.select_date(date(2024, 8, 15));
        s.set_draft_title("Flight home");
        s.commit_draft().await.unwrap();
        wait_until(&mut s, |c| c.len() == 1).await;

        s.navigate_month(1);
        let grid = s.month_grid();
        assert_eq!(grid.len(), 31);
        let marked: Vec<_> = grid.iter().filter(|(_, m)| *m).map(|(k, _)| k.to_string()).collect();
        assert_eq!(marked, vec!["2024-08-15".to_string()]);

        s.navigate_month(-8);
        assert_eq!(s.state().nav_month.year, 2023);
        assert_eq!(s.state().nav_month.month, 12);
    }

    #[tokio::test]
    async fn test_unchanged_draft_closes_without_write() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.select_date(date(2024, 7, 4));
        s.commit_draft().await.unwrap();
        assert_eq!(s.state().view, ViewMode::Grid);
        assert!(store.document(COLLECTION, "2024-07-04").is_none());
    }

    #[tokio::test]
    async fn test_abandoned_commit_failure_is_recorded() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        store.set_write_delay(Some(Duration::from_millis(200)));
        store.set_fail_writes(Some("quota exceeded"));

        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        let abandoned = tokio::time::timeout(Duration::from_millis(20), s.commit_draft()).await;
        assert!(abandoned.is_err());
        assert!(s.state().error_message.is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        s.pump_events();
        assert!(
            s.state()
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("quota exceeded"))
        );
    }

    #[tokio::test]
    async fn test_abandoned_commit_still_writes() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        store.set_write_delay(Some(Duration::from_millis(100)));

        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        let abandoned = tokio::time::timeout(Duration::from_millis(10), s.commit_draft()).await;
        assert!(abandoned.is_err());

        wait_until(&mut s, |c| c.contains(&DayKey::parse("2024-07-04").unwrap())).await;
        assert_eq!(store.document(COLLECTION, "2024-07-04").unwrap()["title"], "Fireworks");
    }

    #[tokio::test]
    async fn test_awaited_write_failure_is_not_reported_twice() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        store.set_fail_writes(Some("offline"));
        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        assert!(s.commit_draft().await.is_err());

        store.set_fail_writes(None);
        s.commit_draft().await.unwrap();
        s.pump_events();
        assert!(s.state().error_message.is_none());
    }

    #[tokio::test]
    async fn test_reconnect_after_failed_startup() {
        let store = InMemoryStore::new();
        store.set_fail_subscribe(Some("offline"));
        let outcome = IdentityOutcome {
            identity: Identity::new("u1", IdentityOrigin::Anonymous),
            warning: None,
        };
        let ctx = SessionContext::connect(COLLECTION, outcome, Arc::new(store.clone())).await;
        let mut s = PlannerSession::with_today(ctx, date(2024, 7, 1));
        assert!(matches!(s.reconnect().await, Err(SessionError::Sync(_))));
        assert!(!s.is_ready());

        store.set_fail_subscribe(None);
        s.reconnect().await.unwrap();
        assert!(s.state().error_message.is_none());
        s.wait_ready(Duration::from_secs(2)).await.unwrap();
        assert!(s.is_ready());
    }

    #[tokio::test]
    async fn test_reconnect_after_store_ends_subscription() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.pump_events();

        store.disconnect(COLLECTION, "rules changed");
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match s.next_event().await {
                    Some(SyncEvent::SubscriptionClosed) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());
        assert!(s.state().error_message.is_some());
        assert_eq!(store.subscriber_count(), 0);
        tokio::time::timeout(Duration::from_secs(2), async {
            while s.context().engine().is_subscribed().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        s.reconnect().await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
        s.select_date(date(2024, 7, 4));
        s.set_draft_title("Fireworks");
        s.commit_draft().await.unwrap();
        wait_until(&mut s, |c| c.contains(&DayKey::parse("2024-07-04").unwrap())).await;
    }

    #[tokio::test]
    async fn test_next_event_reports_failure_without_snapshot() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.pump_events();

        store.interrupt(COLLECTION, "connection reset");
        let event = tokio::time::timeout(Duration::from_secs(2), s.next_event())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SyncEvent::SubscriptionFailed { .. }));
        assert!(s.state().error_message.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_removed_plan_leaves_report() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        for day in [2, 3] {
            s.select_date(date(2024, 7, day));
            s.set_draft_title("Day trip");
            s.commit_draft().await.unwrap();
        }
        wait_until(&mut s, |c| c.len() == 2).await;
        assert_eq!(s.build_report(date(2024, 7, 1), date(2024, 7, 3)).unwrap().len(), 2);

        s.select_date(date(2024, 7, 2));
        s.delete_selected().await.unwrap();
        wait_until(&mut s, |c| c.len() == 1).await;
        let report = s.build_report(date(2024, 7, 1), date(2024, 7, 3)).unwrap();
        let dates: Vec<_> = report.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date(2024, 7, 3)]);
    }

    #[tokio::test]
    async fn test_pump_events_records_subscription_failure() {
        let store = InMemoryStore::new();
        let mut s = session(&store, "u1").await;
        s.pump_events();
        assert!(s.state().error_message.is_none());

        store.interrupt(COLLECTION, "connection reset");
        tokio::time::timeout(Duration::from_secs(2), async {
            while s.state().error_message.is_none() {
                s.pump_events();
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(s.state().error_message.as_deref().unwrap().contains("connection reset"));
        assert!(s.is_ready());
    }
}
