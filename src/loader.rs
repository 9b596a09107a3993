use log::{debug, warn};

use crate::error::{IngestError, Result};
use crate::models::{Cell, RawGrid, SourceFile};
use crate::settings::ParserConfig;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Spreadsheet,
}

/// The grid plus what the loader learned while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGrid {
    pub rows: RawGrid,
    pub format: SourceFormat,
    pub delimiter: Option<char>,
    pub sheet_name: Option<String>,
    pub truncated_rows: usize,
}

pub fn detect_format(file: &SourceFile) -> SourceFormat {
    match file.extension().as_deref() {
        Some("csv" | "txt" | "tsv") => return SourceFormat::Delimited,
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => return SourceFormat::Spreadsheet,
        _ => {}
    }
    if let Some(mime) = file.mime_type.as_deref() {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("text/") {
            return SourceFormat::Delimited;
        }
        if mime.contains("spreadsheet") || mime.contains("excel") || mime.contains("opendocument") {
            return SourceFormat::Spreadsheet;
        }
    }
    if file.bytes.starts_with(ZIP_MAGIC) || file.bytes.starts_with(OLE_MAGIC) {
        return SourceFormat::Spreadsheet;
    }
    SourceFormat::Delimited
}

// Windows-1252 assigns printable characters where Latin-1 has C1 controls.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž', '\u{8F}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}', 'ž', 'Ÿ',
];

fn decode_cp1252(b: u8) -> char {
    match b {
        0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
        _ => char::from(b),
    }
}

/// UTF-8 with an optional BOM, otherwise Windows-1252 (a superset of Latin-1 for printable text).
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| decode_cp1252(b)).collect(),
    }
}

/// Pick the delimiter from the non-blank line, among the first `scan_lines`, that holds the most
/// candidate separators. Letterhead lines above the header rarely contain any. Ties go to the comma.
pub fn detect_delimiter(text: &str, scan_lines: usize) -> u8 {
    let counts = |line: &str| {
        let count = |c: char| line.chars().filter(|&x| x == c).count();
        (count(','), count(';'), count('\t'))
    };
    let (commas, semicolons, tabs) = text
        .lines()
        .take(scan_lines.max(1))
        .filter(|l| !l.trim().is_empty())
        .map(counts)
        .fold((0, 0, 0), |best, c| {
            if c.0.max(c.1).max(c.2) > best.0.max(best.1).max(best.2) {
                c
            } else {
                best
            }
        });
    if semicolons > commas && semicolons >= tabs {
        b';'
    } else if tabs > commas && tabs > semicolons {
        b'\t'
    } else {
        b','
    }
}

/// Split text into records at line breaks that fall outside quoted segments.
fn logical_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => {
                lines.push(text[start..i].trim_end_matches('\r'));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < text.len() {
        lines.push(text[start..].trim_end_matches('\r'));
    }
    lines
}

fn reader(input: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(input)
}

/// Read every record of `input`, or `None` when the reader rejects it.
fn read_records(input: &str, delimiter: u8) -> Option<Vec<Vec<Cell>>> {
    let mut rdr = reader(input.as_bytes(), delimiter);
    let mut record = csv::StringRecord::new();
    let mut rows = Vec::new();
    loop {
        match rdr.read_record(&mut record) {
            Ok(true) => rows.push(record.iter().map(Cell::from).collect()),
            Ok(false) => return Some(rows),
            Err(e) => {
                debug!("csv reader stopped: {e}");
                return None;
            }
        }
    }
}

fn parse_record(line: &str, delimiter: u8) -> Vec<Cell> {
    match read_records(line, delimiter) {
        Some(mut rows) if rows.len() == 1 => rows.pop().unwrap_or_default(),
        _ => line.split(delimiter as char).map(Cell::from).collect(),
    }
}

/// Split delimited text into rows. Quoted fields and doubled quotes are handled by the csv
/// reader; blank lines stay in the grid as empty rows so row indices follow the file.
///
/// The non-blank lines go through one reader. If it does not yield exactly one record per
/// line (stray quotes), each line is read on its own instead.
pub fn parse_delimited(text: &str, delimiter: u8) -> RawGrid {
    let lines = logical_lines(text);
    let filled: Vec<&str> = lines.iter().copied().filter(|l| !l.trim().is_empty()).collect();
    let mut records = match read_records(&filled.join("\n"), delimiter) {
        Some(rows) if rows.len() == filled.len() => rows.into_iter(),
        _ => {
            debug!("record count does not match line count, reading line by line");
            filled
                .iter()
                .map(|line| parse_record(line, delimiter))
                .collect::<Vec<_>>()
                .into_iter()
        }
    };
    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                Vec::new()
            } else {
                records.next().unwrap_or_default()
            }
        })
        .collect()
}

#[cfg(feature = "xlsx")]
pub fn cell_from_data(data: &calamine::Data) -> Cell {
    use calamine::Data;
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

#[cfg(feature = "xlsx")]
fn load_spreadsheet(bytes: &[u8], sheet: Option<&str>) -> Result<(RawGrid, String)> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(bytes))
        .map_err(|e| IngestError::Spreadsheet(format!("Failed to open workbook: {e}")))?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| IngestError::Spreadsheet(format!("No sheet named '{wanted}'")))?,
        None => names.first().cloned().ok_or(IngestError::EmptyFile)?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| IngestError::Spreadsheet(format!("Failed to read sheet '{name}': {e}")))?;

    // calamine trims leading empty rows and columns; pad them back so indices match the sheet
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: RawGrid = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    Ok((rows, name))
}

#[cfg(not(feature = "xlsx"))]
fn load_spreadsheet(_bytes: &[u8], _sheet: Option<&str>) -> Result<(RawGrid, String)> {
    Err(IngestError::UnsupportedFormat(
        "spreadsheet support is disabled (build with the `xlsx` feature)".to_string(),
    ))
}

/// Turn an uploaded file into a grid, enforcing the size limit and the row cap.
pub fn load_grid(file: &SourceFile, config: &ParserConfig) -> Result<LoadedGrid> {
    let size = file.declared_size.max(file.bytes.len() as u64);
    if size > config.max_file_bytes {
        return Err(IngestError::OversizedFile {
            size,
            limit: config.max_file_bytes,
        });
    }
    if file.bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let format = detect_format(file);
    let (mut rows, delimiter, sheet_name) = match format {
        SourceFormat::Delimited => {
            let text = decode_text(&file.bytes);
            let delimiter = detect_delimiter(&text, config.header_scan_rows);
            debug!("{}: delimited text, delimiter {:?}", file.name, delimiter as char);
            (parse_delimited(&text, delimiter), Some(delimiter as char), None)
        }
        SourceFormat::Spreadsheet => {
            let (rows, name) = load_spreadsheet(&file.bytes, config.sheet_name.as_deref())?;
            debug!("{}: spreadsheet, sheet '{name}'", file.name);
            (rows, None, Some(name))
        }
    };

    while rows.last().is_some_and(|r| r.iter().all(Cell::is_blank)) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut truncated_rows = 0;
    if rows.len() > config.max_rows {
        truncated_rows = rows.len() - config.max_rows;
        rows.truncate(config.max_rows);
        warn!(
            "{}: row limit of {} reached, {truncated_rows} rows truncated",
            file.name, config.max_rows
        );
    }

    Ok(LoadedGrid {
        rows,
        format,
        delimiter,
        sheet_name,
        truncated_rows,
    })
}
