//! # Timesheet Reconciler
//!
//! A library for comparing the hours a team planned to spend on each project
//! against the hours actually logged, and forecasting how each budget will
//! play out over the rest of the month.
//!
//! ## Core Concepts
//!
//! - **Planned Hours**: A budget per project, either one monthly figure or a list of weekly figures
//! - **Actual Hours**: Logged time per project, either a flat total or a per-day series
//! - **Canonical Names**: Raw timesheet labels are cleaned up so that different spellings of one project merge
//! - **Forecast**: Month-to-date consumption is extrapolated over the remaining working days (Mon-Fri)
//! - **Reconciliation**: Planned and actual collections are unioned into per-project rows and totals
//!
//! ## Example
//!
//! ```rust,ignore
//! use timesheet_reconciler::*;
//! use chrono::NaiveDate;
//!
//! let mut planned = PlannedAllocations::new();
//! planned.insert("Acme".to_string(), PlannedAllocation::monthly(40.0));
//!
//! let bytes = std::fs::read("report.xlsx")?;
//! let today = NaiveDate::from_ymd_opt(2024, 8, 14).unwrap();
//!
//! let report = TimesheetAnalyzer::default().analyze_workbook(&bytes, &planned, ViewMode::Monthly, today)?;
//! for row in &report.rows {
//!     println!("{}: {} / {} ({})", row.project, format_hours(row.actual), format_hours(row.planned), row.forecast.describe());
//! }
//! ```

pub mod calendar;
pub mod error;
pub mod forecast;
pub mod ingestion;
pub mod migration;
pub mod normalizer;
pub mod parser;
pub mod planning;
pub mod reconciler;
pub mod schema;
pub mod utils;

pub use calendar::*;
pub use error::{ReconcilerError, Result};
pub use forecast::{ForecastEngine, ForecastResult, ForecastStatus, DEFAULT_BUFFER_HOURS};
pub use ingestion::*;
pub use migration::{load_state, save_state, StoredState, STORE_VERSION};
pub use normalizer::{NameNormalizer, NormalizationRules, PrefixRule, SubstringRule};
pub use parser::{Cell, ParserConfig, ReportParser};
pub use planning::{PlanAdjustment, PlanAdjustments};
pub use reconciler::*;
pub use schema::*;
pub use utils::*;

use chrono::NaiveDate;
use log::debug;

/// Runs both sources of actual hours through to a reconciliation report.
#[derive(Debug, Clone, Default)]
pub struct TimesheetAnalyzer {
    pub parser: ReportParser,
    pub reconciler: Reconciler,
}

impl TimesheetAnalyzer {
    pub fn new(parser: ReportParser, reconciler: Reconciler) -> Self {
        Self { parser, reconciler }
    }

    pub fn analyze_rows(
        &self,
        rows: &[Vec<Cell>],
        planned: &PlannedAllocations,
        view: ViewMode,
        today: NaiveDate,
    ) -> Result<ReconciliationReport> {
        debug!("Analyzing {} report rows", rows.len());
        let actual = self.parser.parse(rows)?;
        Ok(self.reconciler.reconcile(view, planned, &actual, today))
    }

    pub fn analyze_workbook(
        &self,
        bytes: &[u8],
        planned: &PlannedAllocations,
        view: ViewMode,
        today: NaiveDate,
    ) -> Result<ReconciliationReport> {
        let rows = read_workbook_rows(bytes)?;
        self.analyze_rows(&rows, planned, view, today)
    }

    pub fn analyze_csv(
        &self,
        bytes: &[u8],
        planned: &PlannedAllocations,
        view: ViewMode,
        today: NaiveDate,
    ) -> Result<ReconciliationReport> {
        let rows = read_csv_rows(bytes)?;
        self.analyze_rows(&rows, planned, view, today)
    }

    /// Reconciles scraped totals. A scrape that landed on the dashboard is an
    /// error so the caller can point the user at the timesheet page.
    pub fn analyze_scrape(
        &self,
        outcome: ScrapeOutcome,
        planned: &PlannedAllocations,
        view: ViewMode,
        today: NaiveDate,
    ) -> Result<ReconciliationReport> {
        let actual = outcome
            .into_actual_hours()
            .ok_or(ReconcilerError::WrongPageDashboard)?;
        Ok(self.reconciler.reconcile(view, planned, &actual, today))
    }
}

pub fn reconcile_workbook(
    bytes: &[u8],
    planned: &PlannedAllocations,
    today: NaiveDate,
) -> Result<ReconciliationReport> {
    TimesheetAnalyzer::default().analyze_workbook(bytes, planned, ViewMode::Monthly, today)
}
