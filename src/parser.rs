//! Parser for the weekly-block timesheet export.
//!
//! The export is a single sheet made of repeating weekly blocks. Each block
//! opens with a header row (`Project Name`, `Work Code`, then one column per
//! day) followed by one row per project. A metadata row near the top carries
//! the overall reporting window:
//!
//! ```text
//! Report Date From: 01/07/2024 to 31/07/2024
//! Project Name | Work Code | 01/07/2024 | 02/07/2024 | ...
//! 000001-BD- Project Atlas | DEV | 4 | 3.5 | ...
//! Total Hours | | 8 | 8 | ...
//! ```
//!
//! Day columns that fall outside the reporting window are dropped, so the
//! partial weeks at either end of the export contribute nothing outside it.

use crate::error::{ReconcilerError, Result};
use crate::normalizer::NameNormalizer;
use crate::schema::{ActualHours, ActualRecord, DailyBreakdown, ReportDateRange, META_KEY};
use crate::utils::{parse_dmy_prefix, parse_iso_prefix, parse_leading_number, serial_to_date};
use chrono::NaiveDate;
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One spreadsheet cell, as handed over by the upload boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Reads a day-column header in any of the encodings the export uses: a
    /// native date, a day serial, `DD/MM/YYYY` text or ISO text.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(date) => Some(*date),
            Cell::Number(serial) => serial_to_date(*serial),
            Cell::Text(text) => parse_dmy_prefix(text).or_else(|| parse_iso_prefix(text)),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }

    pub fn as_hours(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if value.is_finite() => Some(*value),
            Cell::Text(text) => parse_leading_number(text),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(value) => write!(f, "{}", value),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => f.write_str(text),
            Cell::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ParserConfig {
    #[schemars(description = "Leading text of the row that carries 'DD/MM/YYYY to DD/MM/YYYY'.")]
    pub date_range_marker: String,

    #[schemars(description = "Literal first and second cells of a weekly block header row.")]
    pub block_header: (String, String),

    #[schemars(description = "Index of the first day column in a block header row.")]
    pub first_day_column: usize,

    #[schemars(description = "Case-sensitive prefixes of first cells that never name a project.")]
    pub excluded_prefixes: Vec<String>,

    #[schemars(description = "Prefixes matched case-insensitively, e.g. signature lines.")]
    pub excluded_prefixes_ignore_case: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            date_range_marker: "Report Date From:".to_string(),
            block_header: ("Project Name".to_string(), "Work Code".to_string()),
            first_day_column: 2,
            excluded_prefixes: [
                "Project Name",
                "Total Hours",
                "Report Date From:",
                "Date & Time Exported:",
                "Staff Name:",
                "Employee Number:",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            excluded_prefixes_ignore_case: vec!["signature".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportParser {
    config: ParserConfig,
    normalizer: NameNormalizer,
}

impl ReportParser {
    pub fn new(config: ParserConfig, normalizer: NameNormalizer) -> Self {
        Self { config, normalizer }
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Converts raw sheet rows into per-project daily hours.
    ///
    /// Fails only when the reporting window cannot be established; bad day
    /// headers and bad hour cells are skipped.
    pub fn parse(&self, rows: &[Vec<Cell>]) -> Result<ActualHours> {
        let range = self.find_date_range(rows)?;

        let mut projects: BTreeMap<String, DailyBreakdown> = BTreeMap::new();
        let mut day_columns: BTreeMap<usize, NaiveDate> = BTreeMap::new();
        let mut blocks = 0usize;

        for row in rows {
            if row.is_empty() {
                continue;
            }

            if self.is_block_header(row) {
                day_columns = self.day_columns(row, &range);
                blocks += 1;
                debug!(
                    "Weekly block {} has {} day columns inside the report range",
                    blocks,
                    day_columns.len()
                );
                continue;
            }

            let Some(label) = row[0].as_text() else {
                continue;
            };
            if !self.is_project_label(label) {
                continue;
            }

            let project = self.normalizer.normalize(label);
            if project.is_empty() || project == META_KEY {
                debug!("Skipping row with unusable project label '{}'", label);
                continue;
            }

            for (&column, &date) in &day_columns {
                let Some(hours) = row.get(column).and_then(Cell::as_hours) else {
                    continue;
                };
                if hours > 0.0 {
                    projects.entry(project.clone()).or_default().add(date, hours);
                }
            }
        }

        info!(
            "Parsed {} projects across {} weekly blocks for {} to {}",
            projects.len(),
            blocks,
            range.start,
            range.end
        );

        Ok(ActualHours {
            meta: Some(range),
            projects: projects
                .into_iter()
                .map(|(name, breakdown)| (name, ActualRecord::Daily(breakdown)))
                .collect(),
        })
    }

    /// Like [`ReportParser::parse`], but an unusable sheet yields an empty
    /// collection instead of an error.
    pub fn parse_lossy(&self, rows: &[Vec<Cell>]) -> ActualHours {
        match self.parse(rows) {
            Ok(actual) => actual,
            Err(e) => {
                warn!("Could not parse timesheet export: {}", e);
                ActualHours::default()
            }
        }
    }

    pub fn find_date_range(&self, rows: &[Vec<Cell>]) -> Result<ReportDateRange> {
        let marker = self.config.date_range_marker.as_str();
        let line = rows
            .iter()
            .filter_map(|row| row.first().and_then(Cell::as_text))
            .find(|text| text.starts_with(marker))
            .ok_or(ReconcilerError::MissingDateRange)?;

        let invalid = || ReconcilerError::InvalidDateRange(line.to_string());

        let span = line.splitn(3, ':').nth(1).ok_or_else(invalid)?.trim();
        let (from, to) = span.split_once(" to ").ok_or_else(invalid)?;
        let start = parse_dmy_prefix(from).ok_or_else(invalid)?;
        let end = parse_dmy_prefix(to).ok_or_else(invalid)?;

        ReportDateRange::new(start, end)
    }

    fn is_block_header(&self, row: &[Cell]) -> bool {
        let (first, second) = &self.config.block_header;
        row.first().and_then(Cell::as_text) == Some(first.as_str())
            && row.get(1).and_then(Cell::as_text) == Some(second.as_str())
    }

    fn day_columns(&self, header: &[Cell], range: &ReportDateRange) -> BTreeMap<usize, NaiveDate> {
        header
            .iter()
            .enumerate()
            .skip(self.config.first_day_column)
            .filter_map(|(column, cell)| cell.as_date().map(|date| (column, date)))
            .filter(|(_, date)| range.contains(*date))
            .collect()
    }

    fn is_project_label(&self, label: &str) -> bool {
        if label.trim().is_empty() {
            return false;
        }
        if self
            .config
            .excluded_prefixes
            .iter()
            .any(|prefix| label.starts_with(prefix.as_str()))
        {
            return false;
        }
        let lowered = label.to_lowercase();
        !self
            .config
            .excluded_prefixes_ignore_case
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_lowercase()))
    }
}
