//! Planner Session Controller
//!
//! Translates user intents (select a date, edit, commit, delete, navigate,
//! print) into sync engine calls and keeps the state the rendering layer
//! draws from.

mod context;
mod controller;
mod error;
mod report;
mod state;

pub use context::SessionContext;
pub use controller::PlannerSession;
pub use error::SessionError;
pub use report::{ReportEntry, ValidationError, build_report};
pub use state::{Draft, NavMonth, SessionState, ViewMode};
