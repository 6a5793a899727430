use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Report date range row not found")]
    MissingDateRange,

    #[error("Invalid report date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid planned week: {0}")]
    InvalidWeek(String),

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Workbook contains no readable sheet")]
    EmptyWorkbook,

    #[error("Timesheet table not found: the active page is the dashboard")]
    WrongPageDashboard,

    #[error("Unsupported store version {0}")]
    UnsupportedStoreVersion(u32),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
