use crate::calendar::week_bounds;
use crate::forecast::{ForecastEngine, ForecastResult};
use crate::schema::{
    ActualHours, ActualRecord, PlanMode, PlannedAllocation, PlannedAllocations, ReportDateRange,
    META_KEY,
};
use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ViewMode {
    Monthly,
    Weekly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum WeeklyStatus {
    OverWeeklyLimit,
    UnderWeeklyLimit,
    OnTrack,
}

impl WeeklyStatus {
    pub fn compare(actual: f64, planned: f64) -> Self {
        if actual > planned {
            WeeklyStatus::OverWeeklyLimit
        } else if actual < planned {
            WeeklyStatus::UnderWeeklyLimit
        } else {
            WeeklyStatus::OnTrack
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            WeeklyStatus::OverWeeklyLimit => "Over weekly limit",
            WeeklyStatus::UnderWeeklyLimit => "Under weekly limit",
            WeeklyStatus::OnTrack => "On track",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RowForecast {
    Monthly(ForecastResult),
    Weekly { status: WeeklyStatus },
}

impl RowForecast {
    pub fn describe(&self) -> String {
        match self {
            RowForecast::Monthly(result) => result.describe(),
            RowForecast::Weekly { status } => status.describe().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectRow {
    pub project: String,
    pub actual: f64,
    pub planned: f64,
    pub diff: f64,
    pub forecast: RowForecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ReconciliationTotals {
    pub total_actual: f64,
    pub total_planned: f64,
    /// Actual hours on projects that have both actual and planned hours.
    pub total_actual_on_planned: f64,
    /// Actual hours on projects with nothing planned.
    pub unplanned_work: f64,
}

impl ReconciliationTotals {
    pub fn total_diff(&self) -> f64 {
        self.total_actual - self.total_planned
    }

    fn add(&mut self, actual: f64, planned: f64) {
        self.total_actual += actual;
        self.total_planned += planned;
        if actual > 0.0 && planned > 0.0 {
            self.total_actual_on_planned += actual;
        }
        if planned == 0.0 && actual > 0.0 {
            self.unplanned_work += actual;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum PlannedWorkHealth {
    OnTrack,
    OverPlan,
    UnderPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReconciliationReport {
    pub view: ViewMode,
    pub as_of: NaiveDate,
    pub report_range: Option<ReportDateRange>,
    /// Sorted by project name.
    pub rows: Vec<ProjectRow>,
    pub totals: ReconciliationTotals,
    pub health: PlannedWorkHealth,
}

impl ReconciliationReport {
    pub fn row(&self, project: &str) -> Option<&ProjectRow> {
        self.rows.iter().find(|r| r.project == project)
    }
}

/// Merges planned and actual hours into per-project rows and totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Reconciler {
    pub engine: ForecastEngine,
    /// Health tolerance for the monthly view, in hours.
    pub monthly_band: f64,
    /// Health tolerance for the weekly view, in hours.
    pub weekly_band: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            engine: ForecastEngine::default(),
            monthly_band: 5.0,
            weekly_band: 2.0,
        }
    }
}

impl Reconciler {
    pub fn new(engine: ForecastEngine) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    pub fn reconcile(
        &self,
        view: ViewMode,
        planned: &PlannedAllocations,
        actual: &ActualHours,
        today: NaiveDate,
    ) -> ReconciliationReport {
        let projects: BTreeSet<&String> = planned
            .keys()
            .chain(actual.projects.keys())
            .filter(|name| name.as_str() != META_KEY)
            .collect();

        let mut rows = Vec::with_capacity(projects.len());
        let mut totals = ReconciliationTotals::default();

        for project in projects {
            let record = actual.get(project);
            let plan = planned.get(project);

            let (actual_hours, planned_hours) = match view {
                ViewMode::Monthly => (
                    record.map(ActualRecord::total).unwrap_or(0.0),
                    plan.map(|p| p.total).unwrap_or(0.0),
                ),
                ViewMode::Weekly => (
                    weekly_actual(record, today),
                    plan.map(|p| weekly_planned(p, today)).unwrap_or(0.0),
                ),
            };

            totals.add(actual_hours, planned_hours);

            let forecast = match view {
                ViewMode::Monthly => {
                    RowForecast::Monthly(self.monthly_forecast(record, planned_hours, today))
                }
                ViewMode::Weekly => RowForecast::Weekly {
                    status: WeeklyStatus::compare(actual_hours, planned_hours),
                },
            };

            debug!(
                "{}: actual={:.2} planned={:.2} forecast={}",
                project,
                actual_hours,
                planned_hours,
                forecast.describe()
            );

            rows.push(ProjectRow {
                project: project.clone(),
                actual: actual_hours,
                planned: planned_hours,
                diff: actual_hours - planned_hours,
                forecast,
            });
        }

        let health = self.health(view, &totals);

        info!(
            "Reconciled {} projects ({:?} view): actual {:.2}, planned {:.2}, unplanned {:.2}",
            rows.len(),
            view,
            totals.total_actual,
            totals.total_planned,
            totals.unplanned_work
        );

        ReconciliationReport {
            view,
            as_of: today,
            report_range: actual.meta,
            rows,
            totals,
            health,
        }
    }

    pub fn health(&self, view: ViewMode, totals: &ReconciliationTotals) -> PlannedWorkHealth {
        let band = match view {
            ViewMode::Monthly => self.monthly_band,
            ViewMode::Weekly => self.weekly_band,
        };
        let difference = totals.total_actual_on_planned - totals.total_planned;

        if difference.abs() <= band {
            PlannedWorkHealth::OnTrack
        } else if difference > 0.0 {
            PlannedWorkHealth::OverPlan
        } else {
            PlannedWorkHealth::UnderPlan
        }
    }

    fn monthly_forecast(
        &self,
        record: Option<&ActualRecord>,
        planned: f64,
        today: NaiveDate,
    ) -> ForecastResult {
        match record {
            Some(ActualRecord::Total(hours)) => self.engine.forecast_total(*hours, planned, today),
            Some(ActualRecord::Daily(breakdown)) => {
                self.engine.forecast(&breakdown.daily_hours, planned, today)
            }
            None => self.engine.forecast(&BTreeMap::new(), planned, today),
        }
    }
}

fn weekly_actual(record: Option<&ActualRecord>, today: NaiveDate) -> f64 {
    let (monday, sunday) = week_bounds(today);
    record
        .and_then(ActualRecord::daily)
        .map(|breakdown| breakdown.hours_between(monday, sunday))
        .unwrap_or(0.0)
}

/// Hours of the planned week containing `today`. Monthly plans are not
/// pro-rated into weeks.
fn weekly_planned(plan: &PlannedAllocation, today: NaiveDate) -> f64 {
    match plan.mode {
        PlanMode::Monthly => 0.0,
        PlanMode::Weekly => plan.week_containing(today).map(|w| w.hours).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastStatus;
    use crate::schema::{DailyBreakdown, PlannedWeek};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn planned(entries: &[(&str, PlannedAllocation)]) -> PlannedAllocations {
        entries
            .iter()
            .map(|(name, plan)| (name.to_string(), plan.clone()))
            .collect()
    }

    fn totals(entries: &[(&str, f64)]) -> ActualHours {
        ActualHours::from_totals(
            entries
                .iter()
                .map(|(name, hours)| (name.to_string(), *hours))
                .collect(),
        )
    }

    #[test]
    fn test_matching_totals_are_on_track() {
        let reconciler = Reconciler::default();
        let report = reconciler.reconcile(
            ViewMode::Monthly,
            &planned(&[("Acme", PlannedAllocation::monthly(40.0))]),
            &totals(&[("Acme", 40.0)]),
            date(2024, 8, 30),
        );

        let row = report.row("Acme").unwrap();
        assert_eq!(row.diff, 0.0);
        match &row.forecast {
            RowForecast::Monthly(result) => assert_eq!(result.status, ForecastStatus::OnTrack),
            other => panic!("unexpected forecast {:?}", other),
        }
        assert_eq!(report.health, PlannedWorkHealth::OnTrack);
    }

    #[test]
    fn test_union_defaults_missing_side_to_zero() {
        let reconciler = Reconciler::default();
        let report = reconciler.reconcile(
            ViewMode::Monthly,
            &planned(&[("Planned Only", PlannedAllocation::monthly(20.0))]),
            &totals(&[("Actual Only", 12.0)]),
            date(2024, 8, 14),
        );

        let names: Vec<&str> = report.rows.iter().map(|r| r.project.as_str()).collect();
        assert_eq!(names, vec!["Actual Only", "Planned Only"]);

        let actual_only = report.row("Actual Only").unwrap();
        assert_eq!(actual_only.planned, 0.0);
        assert_eq!(actual_only.diff, 12.0);

        let planned_only = report.row("Planned Only").unwrap();
        assert_eq!(planned_only.actual, 0.0);
        assert_eq!(planned_only.diff, -20.0);

        assert_eq!(report.totals.total_actual, 12.0);
        assert_eq!(report.totals.total_planned, 20.0);
        assert_eq!(report.totals.unplanned_work, 12.0);
        assert_eq!(report.totals.total_actual_on_planned, 0.0);
        assert_eq!(report.totals.total_diff(), -8.0);
        assert_eq!(report.health, PlannedWorkHealth::UnderPlan);
    }

    #[test]
    fn test_unplanned_work_is_flagged() {
        let reconciler = Reconciler::default();
        let mut breakdown = DailyBreakdown::default();
        breakdown.add(date(2024, 8, 13), 6.0);
        let mut actual = ActualHours::default();
        actual
            .projects
            .insert("Side Quest".to_string(), ActualRecord::Daily(breakdown));

        let report = reconciler.reconcile(
            ViewMode::Monthly,
            &PlannedAllocations::new(),
            &actual,
            date(2024, 8, 14),
        );
        let row = report.row("Side Quest").unwrap();
        match &row.forecast {
            RowForecast::Monthly(result) => assert_eq!(result.status, ForecastStatus::Unplanned),
            other => panic!("unexpected forecast {:?}", other),
        }
        assert_eq!(report.totals.unplanned_work, 6.0);
    }

    #[test]
    fn test_weekly_view_uses_current_week_only() {
        let reconciler = Reconciler::default();
        let today = date(2024, 8, 14);

        let mut breakdown = DailyBreakdown::default();
        breakdown.add(date(2024, 8, 9), 7.0);
        breakdown.add(date(2024, 8, 12), 3.0);
        breakdown.add(date(2024, 8, 14), 4.0);
        breakdown.add(date(2024, 8, 18), 1.0);
        let mut actual = totals(&[("Scraped", 30.0)]);
        actual
            .projects
            .insert("Acme".to_string(), ActualRecord::Daily(breakdown));

        let weekly_plan = PlannedAllocation::weekly(vec![
            PlannedWeek {
                start: date(2024, 8, 5),
                end: date(2024, 8, 11),
                hours: 10.0,
            },
            PlannedWeek {
                start: date(2024, 8, 12),
                end: date(2024, 8, 18),
                hours: 6.0,
            },
        ]);
        let plans = planned(&[
            ("Acme", weekly_plan),
            ("Scraped", PlannedAllocation::monthly(80.0)),
        ]);

        let report = reconciler.reconcile(ViewMode::Weekly, &plans, &actual, today);

        let acme = report.row("Acme").unwrap();
        assert_eq!(acme.actual, 8.0);
        assert_eq!(acme.planned, 6.0);
        assert_eq!(
            acme.forecast,
            RowForecast::Weekly {
                status: WeeklyStatus::OverWeeklyLimit
            }
        );

        // Total-only records and monthly plans both contribute zero in the weekly view
        let scraped = report.row("Scraped").unwrap();
        assert_eq!(scraped.actual, 0.0);
        assert_eq!(scraped.planned, 0.0);
        assert_eq!(scraped.forecast.describe(), "On track");

        assert_eq!(report.totals.total_actual_on_planned, 8.0);
        assert_eq!(report.health, PlannedWorkHealth::OnTrack);
    }

    #[test]
    fn test_health_band_depends_on_view() {
        let reconciler = Reconciler::default();
        let totals = ReconciliationTotals {
            total_actual: 44.0,
            total_planned: 40.0,
            total_actual_on_planned: 44.0,
            unplanned_work: 0.0,
        };
        assert_eq!(
            reconciler.health(ViewMode::Monthly, &totals),
            PlannedWorkHealth::OnTrack
        );
        assert_eq!(
            reconciler.health(ViewMode::Weekly, &totals),
            PlannedWorkHealth::OverPlan
        );
    }

    #[test]
    fn test_weekly_status_compare() {
        assert_eq!(WeeklyStatus::compare(5.0, 5.0), WeeklyStatus::OnTrack);
        assert_eq!(WeeklyStatus::compare(4.0, 5.0), WeeklyStatus::UnderWeeklyLimit);
        assert_eq!(WeeklyStatus::compare(6.0, 5.0), WeeklyStatus::OverWeeklyLimit);
    }
}
