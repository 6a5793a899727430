use crate::error::{ReconcilerError, Result};
use crate::normalizer::NameNormalizer;
use crate::parser::Cell;
use crate::schema::{ActualHours, META_KEY};
use crate::utils::{parse_leading_number, serial_to_date};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Error code the page scraper sends when it lands on the dashboard.
pub const WRONG_PAGE_DASHBOARD: &str = "WRONG_PAGE_DASHBOARD";

/// Reads the first worksheet of an xlsx buffer as rows of cells.
///
/// Leading empty columns are restored so that cell indices match sheet
/// columns (column A is index 0).
pub fn read_workbook_rows(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes))
        .map_err(|e| ReconcilerError::Workbook(e.to_string()))?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ReconcilerError::EmptyWorkbook)?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| ReconcilerError::Workbook(e.to_string()))?;

    let column_offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| {
            let mut cells = vec![Cell::Empty; column_offset];
            cells.extend(row.iter().map(data_to_cell));
            cells
        })
        .collect();

    info!("Read {} rows from worksheet '{}'", rows.len(), first_sheet);
    Ok(rows)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(value) => Cell::Number(*value),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Bool(value) => Cell::Bool(*value),
        Data::DateTime(value) => match serial_to_date(value.as_f64()) {
            Some(date) => Cell::Date(date),
            None => Cell::Number(value.as_f64()),
        },
        Data::DateTimeIso(text) => text
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(text.clone())),
        Data::DurationIso(text) => Cell::Text(text.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// Reads a headerless CSV rendition of the export. Blank fields become
/// [`Cell::Empty`] and numeric fields [`Cell::Number`].
pub fn read_csv_rows(bytes: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(field_to_cell).collect());
    }

    info!("Read {} rows from CSV export", rows.len());
    Ok(rows)
}

fn field_to_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Cell::Number(value),
        _ => Cell::Text(field.to_string()),
    }
}

/// Message returned by the page scraper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeResponse {
    pub success: bool,

    #[serde(default)]
    pub data: Option<BTreeMap<String, serde_json::Value>>,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// Total hours per canonical project.
    Totals(BTreeMap<String, f64>),
    /// No timesheet table, but the dashboard page was recognised.
    WrongPageDashboard,
    /// Nothing usable was found.
    Empty,
}

impl ScrapeOutcome {
    pub fn from_response(response: &ScrapeResponse) -> Self {
        if !response.success {
            return match response.error.as_deref() {
                Some(WRONG_PAGE_DASHBOARD) => ScrapeOutcome::WrongPageDashboard,
                other => {
                    warn!("Scrape failed: {}", other.unwrap_or("no error given"));
                    ScrapeOutcome::Empty
                }
            };
        }

        let totals: BTreeMap<String, f64> = response
            .data
            .iter()
            .flatten()
            .filter(|(name, _)| name.as_str() != META_KEY)
            .filter_map(|(name, value)| match value.as_f64() {
                Some(hours) if hours.is_finite() && hours > 0.0 => Some((name.clone(), hours)),
                _ => {
                    debug!("Ignoring scraped entry '{}' = {}", name, value);
                    None
                }
            })
            .collect();

        Self::from_totals(totals)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let response: ScrapeResponse = serde_json::from_str(json)?;
        Ok(Self::from_response(&response))
    }

    fn from_totals(totals: BTreeMap<String, f64>) -> Self {
        if totals.is_empty() {
            ScrapeOutcome::Empty
        } else {
            ScrapeOutcome::Totals(totals)
        }
    }

    /// The scraped totals as an actual-hours collection. `None` means the
    /// user is on the wrong page and should be told so.
    pub fn into_actual_hours(self) -> Option<ActualHours> {
        match self {
            ScrapeOutcome::Totals(totals) => Some(ActualHours::from_totals(totals)),
            ScrapeOutcome::Empty => Some(ActualHours::default()),
            ScrapeOutcome::WrongPageDashboard => None,
        }
    }
}

/// Cell text of the tables found on the timesheet page, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageSnapshot {
    /// Tables, each a list of rows, each a list of cell texts.
    pub tables: Vec<Vec<Vec<String>>>,

    /// Whether a dashboard-only element was present on the page.
    #[serde(default)]
    pub dashboard_marker: bool,
}

/// Sums the hours per project from the first table with a "project name"
/// header cell. Comment and total columns are skipped, as are blank,
/// "Total" and "Report Date" rows.
pub fn summarize_page(page: &PageSnapshot, normalizer: &NameNormalizer) -> ScrapeOutcome {
    let Some((table, header_row, name_col)) = find_project_table(page) else {
        if page.dashboard_marker {
            info!("No timesheet table found; page looks like the dashboard");
            return ScrapeOutcome::WrongPageDashboard;
        }
        warn!("No timesheet table found on page");
        return ScrapeOutcome::Empty;
    };

    let header = &table[header_row];
    let hour_columns: Vec<usize> = header
        .iter()
        .enumerate()
        .skip(name_col + 1)
        .filter(|(_, text)| {
            let lowered = text.trim().to_lowercase();
            !lowered.is_empty() && !lowered.contains("comment") && !lowered.contains("total")
        })
        .map(|(column, _)| column)
        .collect();

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in &table[header_row + 1..] {
        let Some(raw_name) = row.get(name_col).map(|text| text.trim()) else {
            continue;
        };
        if raw_name.is_empty() || raw_name.starts_with("Total") || raw_name.starts_with("Report Date")
        {
            continue;
        }

        let row_total: f64 = hour_columns
            .iter()
            .filter_map(|&column| row.get(column))
            .filter_map(|text| parse_leading_number(text.trim()))
            .filter(|hours| *hours > 0.0)
            .sum();

        let project = normalizer.normalize(raw_name);
        if row_total > 0.0 && !project.is_empty() && project != META_KEY {
            *totals.entry(project).or_insert(0.0) += row_total;
        }
    }

    ScrapeOutcome::from_totals(totals)
}

fn find_project_table(page: &PageSnapshot) -> Option<(&Vec<Vec<String>>, usize, usize)> {
    page.tables.iter().find_map(|table| {
        table.iter().enumerate().find_map(|(row_index, row)| {
            row.iter()
                .position(|text| collapse_whitespace(text).contains("project name"))
                .map(|column| (table, row_index, column))
        })
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_csv_rows_become_cells() {
        let csv = b"Report Date From: 01/07/2024 to 31/07/2024\nProject Name,Work Code,01/07/2024\nAcme,DEV, 7.5 \nBeta,,\n";
        let rows = read_csv_rows(csv).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![Cell::text("Report Date From: 01/07/2024 to 31/07/2024")]);
        assert_eq!(rows[2][2], Cell::Number(7.5));
        assert_eq!(rows[3], vec![Cell::text("Beta"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn test_garbage_workbook_is_an_error() {
        let result = read_workbook_rows(b"definitely not a zip archive");
        assert!(matches!(result, Err(ReconcilerError::Workbook(_))));
    }

    #[test]
    fn test_scrape_response_with_totals() {
        let outcome = ScrapeOutcome::from_json(
            r#"{"success": true, "data": {"Acme": 12.5, "Beta": "n/a", "Gamma": 0}}"#,
        )
        .unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("Acme".to_string(), 12.5);
        assert_eq!(outcome, ScrapeOutcome::Totals(expected));

        let actual = outcome.into_actual_hours().unwrap();
        assert_eq!(actual.get("Acme").map(|r| r.total()), Some(12.5));
        assert!(actual.meta.is_none());
    }

    #[test]
    fn test_scrape_response_wrong_page_and_failures() {
        let wrong = ScrapeOutcome::from_json(
            r#"{"success": false, "error": "WRONG_PAGE_DASHBOARD"}"#,
        )
        .unwrap();
        assert_eq!(wrong, ScrapeOutcome::WrongPageDashboard);
        assert!(wrong.into_actual_hours().is_none());

        let failed = ScrapeOutcome::from_json(r#"{"success": false}"#).unwrap();
        assert_eq!(failed, ScrapeOutcome::Empty);

        let empty = ScrapeOutcome::from_json(r#"{"success": true, "data": {}}"#).unwrap();
        assert_eq!(empty.into_actual_hours(), Some(ActualHours::default()));
    }

    #[test]
    fn test_summarize_page_sums_hour_columns() {
        let page = PageSnapshot {
            tables: vec![
                vec![row(&["Navigation"])],
                vec![
                    row(&["Date", "Staff"]),
                    row(&["", "Project\n  Name", "Mon", "Tue", "Comments", "Total", ""]),
                    row(&["", "000001-BD- Project Atlas", "4", "3.5", "9", "7.5", "2"]),
                    row(&["", "Glencore Mobile Tracking", "2", "", "", "2", ""]),
                    row(&["", "000002-Glencore mobile tracking", "1", "-1", "", "1", ""]),
                    row(&["", "Total", "7", "3.5", "", "10.5", ""]),
                    row(&["", "Idle", "0", "0", "", "0", ""]),
                    row(&[""]),
                ],
            ],
            dashboard_marker: false,
        };

        let outcome = summarize_page(&page, &NameNormalizer::default());
        let mut expected = BTreeMap::new();
        expected.insert("BD- Project Atlas".to_string(), 7.5);
        expected.insert("Mobile Warehouse Operations".to_string(), 3.0);
        assert_eq!(outcome, ScrapeOutcome::Totals(expected));
    }

    #[test]
    fn test_summarize_page_without_table() {
        let normalizer = NameNormalizer::default();
        let dashboard = PageSnapshot {
            tables: vec![vec![row(&["Messages"])]],
            dashboard_marker: true,
        };
        assert_eq!(
            summarize_page(&dashboard, &normalizer),
            ScrapeOutcome::WrongPageDashboard
        );
        assert_eq!(
            summarize_page(&PageSnapshot::default(), &normalizer),
            ScrapeOutcome::Empty
        );
    }
}
