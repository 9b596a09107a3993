use log::debug;

use crate::error::{IngestError, Result};
use crate::models::Cell;

/// Words that mark a date column in any supported export language.
const DATE_KEYWORDS: &[&str] = &["fecha", "date", "datum", "data", "fec"];

/// Words that mark an amount column.
const AMOUNT_KEYWORDS: &[&str] = &[
    "importe", "amount", "monto", "euros", "eur", "cantidad", "betrag", "importo", "montant",
];

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLocation {
    pub row_index: usize,
    pub labels: Vec<String>,
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ß' => 's',
        _ => c,
    }
}

/// Lowercase, strip accents, turn punctuation into spaces and collapse runs of whitespace.
///
/// `"Fecha Operación"` and `"FECHA_OPERACION."` both normalize to `"fecha operacion"`.
pub fn normalize_label(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn matches_keyword(normalized: &str, keywords: &[&str]) -> bool {
    normalized.split(' ').any(|word| {
        keywords
            .iter()
            .any(|kw| word == *kw || (kw.len() >= 5 && word.starts_with(kw)))
    })
}

pub fn is_date_label(normalized: &str) -> bool {
    matches_keyword(normalized, DATE_KEYWORDS)
}

pub fn is_amount_label(normalized: &str) -> bool {
    matches_keyword(normalized, AMOUNT_KEYWORDS)
}

/// A header needs two non-empty cells, with some cell naming a date and some cell naming an amount.
fn is_header_row(row: &[Cell]) -> bool {
    let labels: Vec<String> = row
        .iter()
        .filter(|c| !c.is_blank())
        .map(|c| normalize_label(&c.as_text()))
        .collect();
    labels.len() >= 2
        && labels.iter().any(|l| is_date_label(l))
        && labels.iter().any(|l| is_amount_label(l))
}

/// Return the first row within `scan_limit` that looks like the column-header row.
pub fn locate_header(grid: &[Vec<Cell>], scan_limit: usize) -> Result<HeaderLocation> {
    let scanned = grid.len().min(scan_limit);
    for (row_index, row) in grid.iter().take(scan_limit).enumerate() {
        if is_header_row(row) {
            let labels = row.iter().map(Cell::as_text).collect();
            debug!("header found at row {row_index}");
            return Ok(HeaderLocation { row_index, labels });
        }
    }
    Err(IngestError::NoHeaderFound { scanned })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Fecha Operación"), "fecha operacion");
        assert_eq!(normalize_label("  FECHA_OPERACION. "), "fecha operacion");
        assert_eq!(normalize_label("Importe (€)"), "importe");
        assert_eq!(normalize_label("Año"), "ano");
    }

    #[test]
    fn test_keyword_matching() {
        assert!(is_date_label("fecha valor"));
        assert!(is_date_label("booking date"));
        assert!(is_amount_label("importe eur"));
        assert!(is_amount_label("importes"));
        assert!(!is_amount_label("concepto"));
        assert!(!is_date_label("updated"));
    }

    #[test]
    fn test_skips_logo_rows() {
        let grid = vec![
            row(&["BANCO EJEMPLO S.A."]),
            row(&["Cuenta", "ES12 3456"]),
            row(&[]),
            row(&["Fecha", "Concepto", "Importe", "Saldo"]),
            row(&["01/01/2024", "Nómina", "1.500,00", "2.000,00"]),
        ];
        let loc = locate_header(&grid, 40).unwrap();
        assert_eq!(loc.row_index, 3);
        assert_eq!(loc.labels, vec!["Fecha", "Concepto", "Importe", "Saldo"]);
    }

    #[test]
    fn test_requires_both_date_and_amount() {
        let grid = vec![
            row(&["Fecha", "Concepto"]),
            row(&["Titular", "Importe"]),
            row(&["Date", "Description", "Amount"]),
        ];
        assert_eq!(locate_header(&grid, 40).unwrap().row_index, 2);
    }

    #[test]
    fn test_single_cell_is_never_a_header() {
        let grid = vec![row(&["Fecha importe"]), row(&["", "", ""])];
        assert!(matches!(
            locate_header(&grid, 40),
            Err(IngestError::NoHeaderFound { scanned: 2 })
        ));
    }

    #[test]
    fn test_respects_scan_limit() {
        let mut grid: Vec<Vec<Cell>> = (0..45).map(|_| row(&["logo"])).collect();
        grid.push(row(&["Fecha", "Importe"]));
        assert!(matches!(
            locate_header(&grid, 40),
            Err(IngestError::NoHeaderFound { scanned: 40 })
        ));
        assert_eq!(locate_header(&grid, 50).unwrap().row_index, 45);
    }

    #[test]
    fn test_date_and_amount_may_share_a_cell() {
        let grid = vec![
            row(&["Fecha importe", ""]),
            row(&["Fecha e importe", "Concepto"]),
        ];
        assert_eq!(locate_header(&grid, 40).unwrap().row_index, 1);
    }

    #[test]
    fn test_first_match_wins_and_is_idempotent() {
        let grid = vec![
            row(&["Date", "Amount"]),
            row(&["Fecha", "Concepto", "Importe"]),
        ];
        let first = locate_header(&grid, 40).unwrap();
        let second = locate_header(&grid, 40).unwrap();
        assert_eq!(first.row_index, 0);
        assert_eq!(first, second);
    }
}
