//! PlanCollection - the live date -> plan mapping
//!
//! A collection is immutable once built. The sync engine publishes a fresh
//! `Arc<PlanCollection>` for every remote snapshot, so readers always see a
//! whole snapshot and never a half-applied one.

use std::collections::HashMap;

use super::day_key::DayKey;
use super::plan::Plan;

/// Full mirror of the remote plan collection at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCollection {
    /// Number of snapshots applied so far (0 = none received yet)
    revision: u64,
    plans: HashMap<DayKey, Plan>,
}

impl PlanCollection {
    /// Collection before any snapshot has arrived
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collection built from one decoded snapshot
    pub fn from_snapshot(revision: u64, plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            revision,
            plans: plans.into_iter().map(|p| (p.date_key, p)).collect(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True once at least one snapshot has been applied
    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }

    pub fn get(&self, key: &DayKey) -> Option<&Plan> {
        self.plans.get(key)
    }

    pub fn contains(&self, key: &DayKey) -> bool {
        self.plans.contains_key(key)
    }

    /// Grid-highlight predicate: a plan exists and is not blank
    pub fn has_visible_plan(&self, key: &DayKey) -> bool {
        self.plans.get(key).is_some_and(|p| !p.is_blank())
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DayKey, &Plan)> {
        self.plans.iter()
    }
}
