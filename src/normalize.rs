use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FieldError;
use crate::models::Cell;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

// ---------------------------------------------------------------------------
// Number formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFormat {
    #[serde(deserialize_with = "separator")]
    pub decimal_separator: char,
    /// `""` or `null` when the export has no grouping.
    #[serde(default, deserialize_with = "optional_separator")]
    pub thousand_separator: Option<char>,
}

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn separator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<char, D::Error> {
    let raw = String::deserialize(deserializer)?;
    single_char(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("separator must be exactly one character, got '{raw}'"))
    })
}

fn optional_separator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<char>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => single_char(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("separator must be at most one character, got '{raw}'"))
        }),
    }
}

impl NumberFormat {
    /// `1.234,56`
    pub const fn spanish() -> Self {
        Self {
            decimal_separator: ',',
            thousand_separator: Some('.'),
        }
    }

    /// `1,234.56`
    pub const fn english() -> Self {
        Self {
            decimal_separator: '.',
            thousand_separator: Some(','),
        }
    }
}

// ---------------------------------------------------------------------------
// Date hints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Day,
    Month,
    Year,
}

/// A date layout such as `dd/mm/yyyy`, parsed from its pattern string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateHint {
    order: [DatePart; 3],
    separator: char,
    two_digit_year: bool,
}

fn hint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(dd|mm|yyyy|yy)([/\-. ])(dd|mm|yyyy|yy)([/\-. ])(dd|mm|yyyy|yy)$")
            .expect("static date hint pattern")
    })
}

impl DateHint {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let pattern = pattern.trim().to_ascii_lowercase();
        let caps = hint_regex()
            .captures(&pattern)
            .ok_or_else(|| format!("unsupported date pattern '{pattern}'"))?;
        let separator = caps[2].chars().next().unwrap_or('/');
        if caps[4].chars().next() != Some(separator) {
            return Err(format!("mixed separators in date pattern '{pattern}'"));
        }
        let mut order = [DatePart::Day; 3];
        let mut two_digit_year = false;
        for (slot, idx) in [1, 3, 5].into_iter().enumerate() {
            order[slot] = match &caps[idx] {
                "dd" => DatePart::Day,
                "mm" => DatePart::Month,
                "yy" => {
                    two_digit_year = true;
                    DatePart::Year
                }
                _ => DatePart::Year,
            };
        }
        for part in [DatePart::Day, DatePart::Month, DatePart::Year] {
            if order.iter().filter(|p| **p == part).count() != 1 {
                return Err(format!("date pattern '{pattern}' must name day, month and year once"));
            }
        }
        Ok(Self {
            order,
            separator,
            two_digit_year,
        })
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn pattern(&self) -> String {
        let parts: Vec<&str> = self
            .order
            .iter()
            .map(|p| match p {
                DatePart::Day => "dd",
                DatePart::Month => "mm",
                DatePart::Year if self.two_digit_year => "yy",
                DatePart::Year => "yyyy",
            })
            .collect();
        parts.join(&self.separator.to_string())
    }

    /// Parse a date string laid out by this hint. Any trailing time component is ignored.
    pub fn parse_str(&self, raw: &str) -> Option<NaiveDate> {
        let mut token = raw.trim();
        if self.separator != ' ' {
            token = token.split_whitespace().next()?;
        }
        if self.order[0] == DatePart::Year {
            token = token.split('T').next()?;
        }
        let pieces: Vec<&str> = token.split(self.separator).collect();
        if pieces.len() != 3 {
            return None;
        }
        let (mut day, mut month, mut year) = (0u32, 0u32, 0i32);
        for (part, piece) in self.order.iter().zip(&pieces) {
            if piece.is_empty() || !piece.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            match part {
                DatePart::Day if piece.len() <= 2 => day = piece.parse().ok()?,
                DatePart::Month if piece.len() <= 2 => month = piece.parse().ok()?,
                DatePart::Year if self.two_digit_year && piece.len() == 2 => {
                    year = 2000 + piece.parse::<i32>().ok()?
                }
                DatePart::Year if !self.two_digit_year && piece.len() == 4 => {
                    year = piece.parse().ok()?
                }
                _ => return None,
            }
        }
        if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            return None;
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }

    pub fn format(&self, date: NaiveDate) -> String {
        let parts: Vec<String> = self
            .order
            .iter()
            .map(|p| match p {
                DatePart::Day => format!("{:02}", date.day()),
                DatePart::Month => format!("{:02}", date.month()),
                DatePart::Year if self.two_digit_year => format!("{:02}", date.year() % 100),
                DatePart::Year => format!("{:04}", date.year()),
            })
            .collect();
        parts.join(&self.separator.to_string())
    }
}

impl TryFrom<String> for DateHint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateHint::parse(&value)
    }
}

impl From<DateHint> for String {
    fn from(value: DateHint) -> Self {
        value.pattern()
    }
}

impl fmt::Display for DateHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

// ---------------------------------------------------------------------------
// Cell normalization
// ---------------------------------------------------------------------------

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = base.checked_add_signed(Duration::days(serial.floor() as i64))?;
    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

/// Try each hint in order; numeric cells are read as spreadsheet serials when `serial_dates` is set.
pub fn parse_date(cell: &Cell, hints: &[DateHint], serial_dates: bool) -> Result<NaiveDate, FieldError> {
    if cell.is_blank() {
        return Err(FieldError::MissingValue);
    }
    if let Cell::Number(n) = cell {
        if serial_dates {
            if let Some(date) = excel_serial_to_date(*n) {
                return Ok(date);
            }
        }
    }
    let raw = cell.as_text();
    hints
        .iter()
        .find_map(|hint| hint.parse_str(&raw))
        .ok_or(FieldError::InvalidDate { raw })
}

/// Parse a signed amount. Currency symbols, codes and whitespace are ignored;
/// `(12,00)` and `12,00-` are negative.
pub fn parse_amount(cell: &Cell, format: &NumberFormat) -> Result<f64, FieldError> {
    let raw = match cell {
        Cell::Empty => return Err(FieldError::MissingValue),
        Cell::Number(n) if n.is_finite() => return Ok(*n),
        Cell::Number(n) => return Err(FieldError::InvalidAmount { raw: n.to_string() }),
        Cell::Text(s) if s.trim().is_empty() => return Err(FieldError::MissingValue),
        Cell::Text(s) => s.trim().to_string(),
    };
    let invalid = || FieldError::InvalidAmount { raw: raw.clone() };

    let mut s: String = raw
        .chars()
        .filter(|c| {
            c.is_ascii_digit()
                || matches!(c, '-' | '+' | '(' | ')')
                || *c == format.decimal_separator
                || Some(*c) == format.thousand_separator
        })
        .collect();

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.to_string();
    } else if let Some(inner) = s.strip_suffix('-') {
        negative = true;
        s = inner.to_string();
    }
    if let Some(sep) = format.thousand_separator {
        s = s.replace(sep, "");
    }
    if format.decimal_separator != '.' {
        s = s.replace(format.decimal_separator, ".");
    }
    let s = s.strip_prefix('+').unwrap_or(&s);
    if s.is_empty() || !s.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: f64 = s.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(if negative { -value } else { value })
}

/// Trimmed text, or `None` for a blank cell.
pub fn parse_text(cell: &Cell) -> Option<String> {
    let text = cell.as_text();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}
