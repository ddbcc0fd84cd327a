//! Printable report over a date range

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::domain::{DayKey, Plan, PlanCollection};

/// Report range problems; nothing is sent to the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("Choose both a start and an end date")]
    MissingBounds,
}

/// One day of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub date: NaiveDate,
    pub plan: Plan,
}

/// Plans with content between `start` and `end` inclusive, oldest first
///
/// Walks every calendar day of the range, so the result is ascending by
/// construction. Blank plans are left out.
pub fn build_report(
    plans: &PlanCollection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ReportEntry>, ValidationError> {
    debug!(%start, %end, plan_count = plans.len(), "build_report: called");
    if end < start {
        return Err(ValidationError::EndBeforeStart { start, end });
    }

    let entries = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter_map(|date| {
            plans
                .get(&DayKey::from_date(date))
                .filter(|plan| !plan.is_blank())
                .map(|plan| ReportEntry {
                    date,
                    plan: plan.clone(),
                })
        })
        .collect();

    Ok(entries)
}
