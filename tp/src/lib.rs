//! Trip Planner - shared calendar of day plans with live sync
//!
//! Several people plan one trip on a month calendar. Each day can carry a
//! plan (title and description); every edit is written to a hosted realtime
//! document store and pushed back to every open session.
//!
//! # Modules
//!
//! - [`domain`] - day keys, plans, and the plan collection
//! - [`identity`] - session identity acquisition with local fallback
//! - [`store`] - remote document store boundary (HTTP and in-memory)
//! - [`sync`] - subscription-driven mirror of the plan collection
//! - [`session`] - planner session state and user intents
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod identity;
pub mod session;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use domain::{DayKey, Plan, PlanCollection, PlanPatch};
pub use identity::{Identity, IdentityOrigin, IdentityOutcome, IdentityProvider, acquire_identity};
pub use session::{PlannerSession, ReportEntry, SessionContext, SessionError, SessionState, ViewMode, build_report};
pub use store::{InMemoryStore, RemoteStore, StoreError, StoreEvent};
pub use sync::{SyncEngine, SyncError, SyncEvent};
