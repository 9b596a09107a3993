use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CanonicalField;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File is too large: {size} bytes (limit {limit})")]
    OversizedFile { size: u64, limit: u64 },

    #[error("No header row found in the first {scanned} rows (need a date column and an amount column)")]
    NoHeaderFound { scanned: usize },

    #[error("Missing required columns: {}", join_fields(.missing))]
    MissingRequiredColumns { missing: Vec<CanonicalField> },

    #[error("No valid movements found ({invalid} invalid rows)")]
    NoValidMovements { invalid: usize },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid bank profile '{key}': {reason}")]
    InvalidProfile { key: String, reason: String },

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification of a failed parse, exposed in `ParseOutcome::Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyFile,
    OversizedFile,
    NoHeaderFound,
    MissingRequiredColumns,
    NoValidMovements,
    UnsupportedFormat,
    InvalidProfile,
    Io,
    Other,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyFile => ErrorKind::EmptyFile,
            Self::OversizedFile { .. } => ErrorKind::OversizedFile,
            Self::NoHeaderFound { .. } => ErrorKind::NoHeaderFound,
            Self::MissingRequiredColumns { .. } => ErrorKind::MissingRequiredColumns,
            Self::NoValidMovements { .. } => ErrorKind::NoValidMovements,
            Self::UnsupportedFormat(_) | Self::Spreadsheet(_) | Self::Csv(_) => {
                ErrorKind::UnsupportedFormat
            }
            Self::InvalidProfile { .. } => ErrorKind::InvalidProfile,
            Self::Io(_) => ErrorKind::Io,
            Self::Db(_) | Self::Json(_) | Self::Settings(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Why a single cell could not be normalized. Row-level and recoverable.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldError {
    #[error("invalid date '{raw}'")]
    InvalidDate { raw: String },

    #[error("invalid amount '{raw}'")]
    InvalidAmount { raw: String },

    #[error("missing value")]
    MissingValue,
}

/// A `FieldError` located in the source file. `row` is the zero-based grid index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub field: CanonicalField,
    pub error: FieldError,
}

impl fmt::Display for RowError {
    // Users count rows from 1, like a spreadsheet does.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}: {}", self.row + 1, self.field.key(), self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_fields() {
        let err = IngestError::MissingRequiredColumns {
            missing: vec![CanonicalField::Date, CanonicalField::Amount],
        };
        assert_eq!(err.to_string(), "Missing required columns: date, amount");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredColumns);
    }

    #[test]
    fn test_row_error_is_one_based() {
        let err = RowError {
            row: 16,
            field: CanonicalField::Amount,
            error: FieldError::InvalidAmount { raw: "12,,0".to_string() },
        };
        assert_eq!(err.to_string(), "Row 17: amount: invalid amount '12,,0'");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NoValidMovements).unwrap();
        assert_eq!(json, "\"no_valid_movements\"");
    }
}
