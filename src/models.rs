use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, IngestError, Result, RowError};
use crate::profiles::BankProfile;

/// One cell as loaded from the file, before any locale coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed textual form. Whole numbers render without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

/// Rows of cells exactly as loaded; no semantic meaning yet.
pub type RawGrid = Vec<Vec<Cell>>;

/// The semantic columns every bank profile maps raw headers onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Date,
    ValueDate,
    Amount,
    Description,
    Counterparty,
    Balance,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Date,
        CanonicalField::ValueDate,
        CanonicalField::Amount,
        CanonicalField::Description,
        CanonicalField::Counterparty,
        CanonicalField::Balance,
    ];

    pub const REQUIRED: [CanonicalField; 2] = [CanonicalField::Date, CanonicalField::Amount];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::ValueDate => "valueDate",
            Self::Amount => "amount",
            Self::Description => "description",
            Self::Counterparty => "counterparty",
            Self::Balance => "balance",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().find(|f| f.key() == key).copied()
    }
}

/// Canonical field → column index, built fresh for every parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderMapping {
    columns: BTreeMap<CanonicalField, usize>,
}

impl HeaderMapping {
    pub fn new(columns: BTreeMap<CanonicalField, usize>) -> Self {
        Self { columns }
    }

    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .iter()
            .filter(|f| !self.columns.contains_key(f))
            .copied()
            .collect()
    }

    pub fn has_required(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(f, i)| (*f, *i))
    }
}

/// A file as handed over by the host: name, declared type and content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub declared_size: u64,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            declared_size: bytes.len() as u64,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk, refusing to load it at all when it exceeds `max_bytes`.
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        if size > max_bytes {
            return Err(IngestError::OversizedFile {
                size,
                limit: max_bytes,
            });
        }
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        Ok(Self {
            name,
            mime_type: None,
            declared_size: size,
            bytes,
        })
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            filename: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.bytes.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub filename: String,
    pub mime_type: Option<String>,
    pub size: u64,
}

/// One validated financial movement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMovement {
    pub date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub amount: f64,
    pub description: String,
    pub counterparty: Option<String>,
    pub balance: Option<f64>,
    pub original_row_index: usize,
    pub raw_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBank {
    pub bank_key: String,
    pub bank_version: Option<String>,
    pub generic: bool,
    pub profile: BankProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMetadata {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub mapping: HeaderMapping,
    pub imported_rows: usize,
    pub omitted_rows: usize,
    pub invalid_rows: usize,
    pub source: SourceInfo,
    pub delimiter: Option<char>,
    pub sheet_name: Option<String>,
    pub stopped_early_at: Option<usize>,
    pub truncated_rows: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub movements: Vec<ParsedMovement>,
    pub total_rows: usize,
    pub errors: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub detected_bank: Option<DetectedBank>,
    pub metadata: ParseMetadata,
}

/// Either a result carrying at least one movement, or a single fatal failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseOutcome {
    Success(ParseResult),
    Failure { kind: ErrorKind, message: String },
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_))
    }

    pub fn result(&self) -> Option<&ParseResult> {
        match self {
            ParseOutcome::Success(r) => Some(r),
            ParseOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            ParseOutcome::Success(_) => None,
            ParseOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<Result<ParseResult>> for ParseOutcome {
    fn from(value: Result<ParseResult>) -> Self {
        match value {
            Ok(result) => ParseOutcome::Success(result),
            Err(e) => ParseOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_rendering() {
        assert_eq!(Cell::Number(45292.0).as_text(), "45292");
        assert_eq!(Cell::Number(-12.5).as_text(), "-12.5");
        assert_eq!(Cell::text("  Fecha ").as_text(), "Fecha");
        assert!(Cell::text("   ").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert_eq!(Cell::from(""), Cell::Empty);
    }

    #[test]
    fn test_canonical_field_keys_roundtrip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_key(field.key()), Some(field));
        }
        let json = serde_json::to_string(&CanonicalField::ValueDate).unwrap();
        assert_eq!(json, "\"valueDate\"");
    }

    #[test]
    fn test_mapping_reports_missing_required() {
        let mut columns = BTreeMap::new();
        columns.insert(CanonicalField::Date, 0);
        columns.insert(CanonicalField::Description, 1);
        let mapping = HeaderMapping::new(columns);
        assert_eq!(mapping.missing_required(), vec![CanonicalField::Amount]);
        assert!(!mapping.has_required());
    }

    #[test]
    fn test_source_file_from_path_rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.csv");
        std::fs::write(&path, vec![b'a'; 64]).unwrap();
        let err = SourceFile::from_path(&path, 10).unwrap_err();
        assert!(matches!(err, IngestError::OversizedFile { size: 64, limit: 10 }));
        let ok = SourceFile::from_path(&path, 64).unwrap();
        assert_eq!(ok.name, "big.csv");
        assert_eq!(ok.extension().as_deref(), Some("csv"));
    }

    #[test]
    fn test_outcome_from_error() {
        let outcome = ParseOutcome::from(Err(IngestError::NoValidMovements { invalid: 2 }));
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::NoValidMovements));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "no_valid_movements");
    }
}
