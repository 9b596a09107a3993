use std::collections::{BTreeMap, HashMap};

use crate::error::{FieldError, RowError};
use crate::models::{CanonicalField, Cell, HeaderMapping, ParsedMovement};
use crate::normalize::{parse_amount, parse_date, parse_text};
use crate::profiles::BankProfile;

/// Audit keys for each column: the header label, `column_N` when blank, suffixed when repeated.
pub fn column_keys(labels: &[String], width: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..width.max(labels.len()))
        .map(|i| {
            let base = labels
                .get(i)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| format!("column_{}", i + 1));
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base} ({count})")
            }
        })
        .collect()
}

/// Turns classified data rows into movements using one profile and one header mapping.
pub struct MovementBuilder<'a> {
    profile: &'a BankProfile,
    mapping: &'a HeaderMapping,
    labels: &'a [String],
}

impl<'a> MovementBuilder<'a> {
    pub fn new(profile: &'a BankProfile, mapping: &'a HeaderMapping, labels: &'a [String]) -> Self {
        Self {
            profile,
            mapping,
            labels,
        }
    }

    fn cell(&self, row: &'a [Cell], field: CanonicalField) -> Option<&'a Cell> {
        self.mapping.get(field).and_then(|i| row.get(i))
    }

    /// Build one movement. Date and amount are required; every failure on them is reported.
    pub fn build(&self, row_index: usize, row: &'a [Cell]) -> Result<ParsedMovement, Vec<RowError>> {
        let hints = &self.profile.date_hints;
        let serial = self.profile.spreadsheet_dates;
        let format = &self.profile.number_format;
        let located = |field, error| RowError {
            row: row_index,
            field,
            error,
        };

        let date = match self.cell(row, CanonicalField::Date) {
            Some(cell) => parse_date(cell, hints, serial),
            None => Err(FieldError::MissingValue),
        };
        let amount = match self.cell(row, CanonicalField::Amount) {
            Some(cell) => parse_amount(cell, format),
            None => Err(FieldError::MissingValue),
        };
        let (date, amount) = match (date, amount) {
            (Ok(d), Ok(a)) => (d, a),
            (d, a) => {
                let mut errors = Vec::new();
                if let Err(e) = d {
                    errors.push(located(CanonicalField::Date, e));
                }
                if let Err(e) = a {
                    errors.push(located(CanonicalField::Amount, e));
                }
                return Err(errors);
            }
        };

        let value_date = self
            .cell(row, CanonicalField::ValueDate)
            .and_then(|c| parse_date(c, hints, serial).ok());
        let balance = self
            .cell(row, CanonicalField::Balance)
            .and_then(|c| parse_amount(c, format).ok());
        let description = self
            .cell(row, CanonicalField::Description)
            .and_then(parse_text)
            .unwrap_or_default();
        let counterparty = self.cell(row, CanonicalField::Counterparty).and_then(parse_text);

        let keys = column_keys(self.labels, row.len());
        let raw_data: BTreeMap<String, String> = keys
            .into_iter()
            .zip(row.iter().map(Cell::as_text).chain(std::iter::repeat(String::new())))
            .collect();

        Ok(ParsedMovement {
            date,
            value_date,
            amount,
            description,
            counterparty,
            balance,
            original_row_index: row_index,
            raw_data,
        })
    }
}
