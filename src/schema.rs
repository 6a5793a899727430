use crate::error::{ReconcilerError, Result};
use crate::utils::coerce_hours;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved key on the persisted actual-hours collection. Never a project.
pub const META_KEY: &str = "meta";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    #[schemars(description = "A single authoritative figure for the whole month.")]
    #[default]
    Monthly,

    #[schemars(description = "A set of dated weekly figures; the monthly total is their sum.")]
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PlannedWeek {
    #[schemars(description = "First day of the week (inclusive), YYYY-MM-DD.")]
    pub start: NaiveDate,

    #[schemars(description = "Last day of the week (inclusive), YYYY-MM-DD.")]
    pub end: NaiveDate,

    #[schemars(description = "Hours budgeted for this week. Never negative.")]
    pub hours: f64,
}

impl PlannedWeek {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PlannedAllocation {
    pub mode: PlanMode,

    #[schemars(
        description = "Planned hours. Authoritative in monthly mode, always the sum of `weeks` in weekly mode."
    )]
    pub total: f64,

    #[serde(default)]
    #[schemars(description = "Weekly figures, sorted ascending by start date.")]
    pub weeks: Vec<PlannedWeek>,
}

impl PlannedAllocation {
    pub fn monthly(hours: f64) -> Self {
        Self {
            mode: PlanMode::Monthly,
            total: coerce_hours(hours),
            weeks: Vec::new(),
        }
    }

    pub fn weekly(weeks: Vec<PlannedWeek>) -> Self {
        let mut allocation = Self {
            mode: PlanMode::Weekly,
            total: 0.0,
            weeks,
        };
        allocation.normalize_weeks();
        allocation
    }

    pub fn set_monthly_hours(&mut self, hours: f64) {
        self.total = coerce_hours(hours);
        if self.mode == PlanMode::Weekly {
            self.mode = PlanMode::Monthly;
            self.weeks.clear();
        }
    }

    /// Inserts a week, keeping `weeks` sorted and `total` in step with it.
    pub fn add_week(&mut self, start: NaiveDate, end: NaiveDate, hours: f64) -> Result<()> {
        if start > end {
            return Err(ReconcilerError::InvalidWeek(format!(
                "week start {} is after its end {}",
                start, end
            )));
        }

        if self.mode == PlanMode::Monthly {
            self.mode = PlanMode::Weekly;
            self.weeks.clear();
        }

        let position = self.weeks.partition_point(|w| w.start <= start);
        self.weeks.insert(
            position,
            PlannedWeek {
                start,
                end,
                hours: coerce_hours(hours),
            },
        );
        self.recompute_total();
        Ok(())
    }

    /// Removes every week starting on `start`. Returns whether anything was removed.
    pub fn remove_week(&mut self, start: NaiveDate) -> bool {
        let before = self.weeks.len();
        self.weeks.retain(|w| w.start != start);
        let removed = self.weeks.len() != before;
        if removed {
            self.recompute_total();
        }
        removed
    }

    pub fn switch_mode(&mut self, mode: PlanMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.weeks.clear();
        self.total = 0.0;
    }

    pub fn week_containing(&self, date: NaiveDate) -> Option<&PlannedWeek> {
        self.weeks.iter().find(|w| w.contains(date))
    }

    /// Restores the ordering and total invariants after an external edit
    /// (e.g. deserialization of hand-written data).
    pub fn normalize_weeks(&mut self) {
        for week in &mut self.weeks {
            week.hours = coerce_hours(week.hours);
        }
        self.weeks.sort_by_key(|w| w.start);
        match self.mode {
            PlanMode::Weekly => self.recompute_total(),
            PlanMode::Monthly => self.total = coerce_hours(self.total),
        }
    }

    fn recompute_total(&mut self) {
        self.total = self.weeks.iter().map(|w| w.hours).sum();
    }
}

pub type PlannedAllocations = BTreeMap<String, PlannedAllocation>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ReportDateRange {
    #[serde(rename = "startDate")]
    pub start: NaiveDate,

    #[serde(rename = "endDate")]
    pub end: NaiveDate,
}

impl ReportDateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReconcilerError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Per-day hours for one project, as produced by the spreadsheet parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct DailyBreakdown {
    #[serde(rename = "dailyHours")]
    pub daily_hours: BTreeMap<NaiveDate, f64>,

    #[serde(rename = "totalHours")]
    pub total_hours: f64,
}

impl DailyBreakdown {
    /// Adds positive hours to a day. Zero, negative and non-finite values are
    /// ignored so that absent days stay absent.
    pub fn add(&mut self, date: NaiveDate, hours: f64) {
        if !hours.is_finite() || hours <= 0.0 {
            return;
        }
        *self.daily_hours.entry(date).or_insert(0.0) += hours;
        self.total_hours += hours;
    }

    pub fn from_daily(daily_hours: BTreeMap<NaiveDate, f64>) -> Self {
        let mut breakdown = Self::default();
        for (date, hours) in daily_hours {
            breakdown.add(date, hours);
        }
        breakdown
    }

    pub fn hours_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.daily_hours.range(start..=end).map(|(_, h)| h).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.daily_hours.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum ActualRecord {
    #[schemars(description = "Total hours with no daily breakdown (live page scrape).")]
    Total(f64),

    #[schemars(description = "Per-day hours (spreadsheet export).")]
    Daily(DailyBreakdown),
}

impl ActualRecord {
    pub fn total(&self) -> f64 {
        match self {
            ActualRecord::Total(hours) => *hours,
            ActualRecord::Daily(breakdown) => breakdown.total_hours,
        }
    }

    pub fn daily(&self) -> Option<&DailyBreakdown> {
        match self {
            ActualRecord::Total(_) => None,
            ActualRecord::Daily(breakdown) => Some(breakdown),
        }
    }
}

/// The actual-hours collection, replaced wholesale on each upload or scrape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct ActualHours {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ReportDateRange>,

    #[serde(flatten)]
    pub projects: BTreeMap<String, ActualRecord>,
}

impl ActualHours {
    pub fn from_totals(totals: BTreeMap<String, f64>) -> Self {
        Self {
            meta: None,
            projects: totals
                .into_iter()
                .filter(|(name, _)| name != META_KEY)
                .map(|(name, hours)| (name, ActualRecord::Total(coerce_hours(hours))))
                .collect(),
        }
    }

    pub fn get(&self, project: &str) -> Option<&ActualRecord> {
        self.projects.get(project)
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
