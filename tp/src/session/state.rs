//! Planner session state
//!
//! Pure data for the rendering layer. No I/O here.

use chrono::{Datelike, NaiveDate};

use super::report::ReportEntry;
use crate::domain::{DayKey, Plan, PlanPatch};

/// What the rendering layer should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Month grid (default)
    #[default]
    Grid,
    /// Edit dialog for the selected date
    EditModal,
    /// Date range picker for the printable report
    PrintRangePicker,
    /// The built report
    PrintReport,
}

impl ViewMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Grid => "Calendar",
            Self::EditModal => "Edit plan",
            Self::PrintRangePicker => "Print range",
            Self::PrintReport => "Report",
        }
    }
}

/// Title and description being edited for the selected date
///
/// Remembers the values the editor opened with (empty for a day with no
/// plan) so a commit only sends the fields the user actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    loaded: Option<(String, String)>,
}

impl Draft {
    /// Empty draft for a date with no plan
    pub fn blank() -> Self {
        Self::default()
    }

    /// Draft preloaded from an existing plan
    pub fn from_plan(plan: &Plan) -> Self {
        let title = plan.title().to_string();
        let description = plan.description().to_string();
        Self {
            loaded: Some((title.clone(), description.clone())),
            title,
            description,
        }
    }

    /// True when the draft was preloaded from an existing plan
    pub fn is_existing(&self) -> bool {
        self.loaded.is_some()
    }

    fn baseline(&self) -> (&str, &str) {
        match &self.loaded {
            Some((title, description)) => (title.as_str(), description.as_str()),
            None => ("", ""),
        }
    }

    pub fn is_dirty(&self) -> bool {
        let (title, description) = self.baseline();
        title != self.title || description != self.description
    }

    /// Merge patch carrying only the fields that differ from what the
    /// editor opened with
    ///
    /// Untouched fields are left out, so a concurrent edit to them by
    /// another session survives, even when both sessions start from a day
    /// with no plan.
    pub fn to_patch(&self) -> PlanPatch {
        let (title, description) = self.baseline();
        PlanPatch {
            title: (title != self.title).then(|| self.title.clone()),
            description: (description != self.description).then(|| self.description.clone()),
        }
    }
}

/// Month shown by the calendar grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavMonth {
    pub year: i32,
    /// 1-based
    pub month: u32,
}

impl NavMonth {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month `delta` months away (negative moves backward)
    ///
    /// The year is clamped to the range chrono can represent.
    pub fn shift(self, delta: i32) -> Self {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(delta);
        let year = index
            .div_euclid(12)
            .clamp(i64::from(NaiveDate::MIN.year()), i64::from(NaiveDate::MAX.year()));
        Self {
            year: year as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Every day of the month, in order
    pub fn days(&self) -> Vec<DayKey> {
        let Some(first) = self.first_day() else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| d.month() == self.month)
            .map(DayKey::from_date)
            .collect()
    }

    pub fn label(&self) -> String {
        match self.first_day() {
            Some(first) => first.format("%B %Y").to_string(),
            None => format!("{:04}-{:02}", self.year, self.month),
        }
    }
}

/// Everything the rendering layer reads from a planner session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub view: ViewMode,
    pub selected_date: Option<NaiveDate>,
    pub draft: Draft,
    pub nav_month: NavMonth,
    pub print_start: Option<NaiveDate>,
    pub print_end: Option<NaiveDate>,
    /// Report built by the last successful `show_report`
    pub report: Vec<ReportEntry>,
    /// Last error, shown until the next successful action
    pub error_message: Option<String>,
    /// Non-fatal notice, e.g. a degraded identity
    pub warning_message: Option<String>,
}

impl SessionState {
    /// Fresh state with the grid on `today`'s month
    pub fn new(today: NaiveDate) -> Self {
        Self {
            view: ViewMode::Grid,
            selected_date: None,
            draft: Draft::blank(),
            nav_month: NavMonth::containing(today),
            print_start: None,
            print_end: None,
            report: Vec::new(),
            error_message: None,
            warning_message: None,
        }
    }

    pub fn selected_key(&self) -> Option<DayKey> {
        self.selected_date.map(DayKey::from_date)
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error_message = Some(msg.into());
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plan(title: &str, description: &str) -> Plan {
        Plan {
            date_key: DayKey::from_date(date(2024, 7, 4)),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            last_updated_by: "u1".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_new_draft_sends_only_filled_fields() {
        let mut draft = Draft::blank();
        assert!(!draft.is_dirty());
        assert_eq!(draft.to_patch(), PlanPatch::default());

        draft.title = "Fireworks".to_string();
        assert!(draft.is_dirty());
        assert_eq!(draft.to_patch(), PlanPatch::default().with_title("Fireworks"));

        draft.description = "Pier 39".to_string();
        assert_eq!(draft.to_patch(), PlanPatch::full("Fireworks", "Pier 39"));
    }

    #[test]
    fn test_existing_draft_sends_only_changes() {
        let mut draft = Draft::from_plan(&plan("Fireworks", "Pier 39"));
        assert!(draft.is_existing());
        assert!(!draft.is_dirty());
        assert_eq!(draft.to_patch(), PlanPatch::default());

        draft.title = "Fireworks!".to_string();
        assert_eq!(draft.to_patch(), PlanPatch::default().with_title("Fireworks!"));

        draft.description = String::new();
        assert_eq!(draft.to_patch(), PlanPatch::full("Fireworks!", ""));
    }

    #[test]
    fn test_nav_month_shift() {
        let m = NavMonth { year: 2024, month: 1 };
        assert_eq!(m.shift(-1), NavMonth { year: 2023, month: 12 });
        assert_eq!(m.shift(11), NavMonth { year: 2024, month: 12 });
        assert_eq!(m.shift(12), NavMonth { year: 2025, month: 1 });
        assert_eq!(m.shift(-25), NavMonth { year: 2021, month: 12 });
        assert_eq!(m.shift(0), m);
    }

    #[test]
    fn test_nav_month_shift_extremes_do_not_overflow() {
        let m = NavMonth { year: 2024, month: 7 };
        let far = m.shift(i32::MAX);
        assert_eq!(far.year, NaiveDate::MAX.year());
        assert!(far.first_day().is_some());
        assert!((1..=12).contains(&far.month));

        let back = m.shift(i32::MIN);
        assert_eq!(back.year, NaiveDate::MIN.year());
        assert!(back.first_day().is_some());

        let edge = NavMonth { year: i32::MAX, month: 12 };
        assert_eq!(edge.shift(1).year, NaiveDate::MAX.year());
    }

    #[test]
    fn test_nav_month_days() {
        let feb = NavMonth { year: 2024, month: 2 };
        let days = feb.days();
        assert_eq!(days.len(), 29);
        assert_eq!(days[0].to_string(), "2024-02-01");
        assert_eq!(days[28].to_string(), "2024-02-29");
        assert_eq!(feb.label(), "February 2024");
    }

    #[test]
    fn test_view_mode_default_is_grid() {
        let state = SessionState::new(date(2024, 7, 4));
        assert_eq!(state.view, ViewMode::Grid);
        assert_eq!(state.nav_month, NavMonth { year: 2024, month: 7 });
        assert!(state.selected_key().is_none());
    }
}
