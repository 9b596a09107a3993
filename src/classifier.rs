use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::header::normalize_label;
use crate::models::Cell;
use crate::settings::ParserConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseReason {
    Blank,
    Separator,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Data,
    Noise(NoiseReason),
}

/// Candidate data rows (grid index + cells) that survived noise filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredRows<'a> {
    pub rows: Vec<(usize, &'a [Cell])>,
    pub omitted: usize,
    pub stopped_at: Option<usize>,
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\s\-*=_.|+]+$").expect("static separator pattern"))
}

fn row_text(row: &[Cell]) -> String {
    row.iter()
        .filter(|c| !c.is_blank())
        .map(Cell::as_text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `noise_patterns` are expected in `normalize_label` form.
pub fn classify_row(row: &[Cell], noise_patterns: &[String]) -> RowClass {
    let text = row_text(row);
    if text.trim().is_empty() {
        return RowClass::Noise(NoiseReason::Blank);
    }
    if separator_regex().is_match(&text) {
        return RowClass::Noise(NoiseReason::Separator);
    }
    let normalized = normalize_label(&text);
    if noise_patterns
        .iter()
        .any(|p| !p.is_empty() && normalized.contains(p.as_str()))
    {
        return RowClass::Noise(NoiseReason::Pattern);
    }
    RowClass::Data
}

/// Walk the rows after the header, dropping noise. Once `min_valid_before_stop` data rows have
/// been kept, a run of `max_consecutive_noise` noise rows ends the data region and everything
/// after it is discarded. A zero run length disables the early stop.
pub fn filter_rows<'a>(
    grid: &'a [Vec<Cell>],
    first_data_row: usize,
    noise_patterns: &[String],
    config: &ParserConfig,
) -> FilteredRows<'a> {
    let patterns: Vec<String> = noise_patterns.iter().map(|p| normalize_label(p)).collect();
    let mut rows = Vec::new();
    let mut omitted = 0usize;
    let mut consecutive_noise = 0usize;
    let mut stopped_at = None;

    for (index, row) in grid.iter().enumerate().skip(first_data_row) {
        match classify_row(row, &patterns) {
            RowClass::Data => {
                consecutive_noise = 0;
                rows.push((index, row.as_slice()));
            }
            RowClass::Noise(_) => {
                consecutive_noise += 1;
                omitted += 1;
                if config.max_consecutive_noise > 0
                    && rows.len() >= config.min_valid_before_stop
                    && consecutive_noise >= config.max_consecutive_noise
                {
                    let discarded = grid.len() - index - 1;
                    omitted += discarded;
                    stopped_at = Some(index);
                    debug!("noise run ended data at row {index}, {discarded} trailing rows discarded");
                    break;
                }
            }
        }
    }

    FilteredRows {
        rows,
        omitted,
        stopped_at,
    }
}
