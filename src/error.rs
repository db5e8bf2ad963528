// ⚠️ Engine Errors
// Only fatal conditions live here. Row-level rejections are values
// (`ingest::row::SkipReason`), never errors.

use thiserror::Error;

/// Fatal outcomes of one import call
#[derive(Debug, Error)]
pub enum ImportError {
    /// Binary spreadsheet (.xlsx / .xls) - rejected before any line is read
    #[error("unsupported file type: {file_name} (save the spreadsheet as CSV before importing)")]
    UnsupportedFileType { file_name: String },

    /// Every candidate row was skipped
    #[error("no bills imported: {processed} rows processed, {skipped} skipped")]
    EmptyImport { processed: usize, skipped: usize },

    /// The "add bill" collaborator failed while receiving accepted records
    #[error(transparent)]
    Sink(#[from] anyhow::Error),
}

/// Rejections of a manual-entry stub by the schedule expander
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("repeat count {count} is outside 1..=360")]
    CountOutOfRange { count: u32 },

    #[error("bill title is empty")]
    EmptyTitle,

    #[error("bill value {value} is not a finite, non-negative amount")]
    InvalidValue { value: f64 },

    #[error("installment {months} months after the first due date is out of range")]
    DateOutOfRange { months: u32 },
}

/// Rejections of an edit to a stored bill
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("bill title is empty")]
    EmptyTitle,

    #[error("bill value {value} is not a finite, non-negative amount")]
    InvalidValue { value: f64 },
}
