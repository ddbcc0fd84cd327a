//! Domain types for the trip planner
//!
//! - [`DayKey`] - canonical `YYYY-MM-DD` day identifier
//! - [`Plan`] / [`PlanPatch`] - a day's plan and a merge write against it
//! - [`PlanCollection`] - the full date -> plan mirror at one revision

mod collection;
mod day_key;
mod plan;

pub use collection::PlanCollection;
pub use day_key::{DayKey, DayKeyError};
pub use plan::{FIELD_DESCRIPTION, FIELD_LAST_UPDATED_BY, FIELD_TIMESTAMP, FIELD_TITLE, Plan, PlanDecodeError, PlanPatch};
