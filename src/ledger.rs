use std::path::Path;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::batch_hash::{movement_fingerprint, BatchHash};
use crate::error::Result;
use crate::models::ParseResult;

pub const DB_FILE: &str = "pulse.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY,
    hash TEXT NOT NULL UNIQUE,
    algorithm TEXT NOT NULL,
    degraded INTEGER DEFAULT 0,
    filename TEXT NOT NULL,
    bank_key TEXT,
    movement_count INTEGER,
    skipped_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    imported_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS movements (
    id INTEGER PRIMARY KEY,
    batch_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    value_date TEXT,
    amount REAL NOT NULL,
    description TEXT NOT NULL,
    counterparty TEXT,
    balance REAL,
    original_row INTEGER,
    fingerprint TEXT NOT NULL,
    raw_data TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (batch_id) REFERENCES batches(id)
);

CREATE INDEX IF NOT EXISTS idx_movements_fingerprint ON movements(fingerprint);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Open (creating if needed) the ledger inside `data_dir`.
pub fn open(data_dir: &Path) -> Result<Connection> {
    std::fs::create_dir_all(data_dir)?;
    let conn = get_connection(&data_dir.join(DB_FILE))?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRecord {
    pub id: i64,
    pub hash: String,
    pub algorithm: String,
    pub degraded: bool,
    pub filename: String,
    pub bank_key: Option<String>,
    pub movement_count: i64,
    pub skipped_count: i64,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub imported_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub batch_id: Option<i64>,
    pub inserted: usize,
    pub skipped: usize,
    pub duplicate_batch: bool,
}

pub fn batch_exists(conn: &Connection, hash: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM batches WHERE hash = ?1")?;
    Ok(stmt.exists([hash])?)
}

pub fn find_batch(conn: &Connection, hash: &str) -> Result<Option<BatchRecord>> {
    let record = conn
        .query_row(
            &format!("{SELECT_BATCH} WHERE hash = ?1"),
            [hash],
            batch_from_row,
        )
        .optional()?;
    Ok(record)
}

// Movements from earlier batches only; repeats inside one statement are legitimate.
fn fingerprint_seen(conn: &Connection, fingerprint: &str, batch_id: i64) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT 1 FROM movements WHERE fingerprint = ?1 AND batch_id != ?2")?;
    Ok(stmt.exists(params![fingerprint, batch_id])?)
}

/// Store an accepted batch and its movements in one transaction. A batch hash that is
/// already recorded is rejected without touching the ledger.
pub fn record_batch(
    conn: &mut Connection,
    filename: &str,
    hash: &BatchHash,
    result: &ParseResult,
) -> Result<RecordOutcome> {
    if batch_exists(conn, &hash.value)? {
        return Ok(RecordOutcome {
            batch_id: None,
            inserted: 0,
            skipped: 0,
            duplicate_batch: true,
        });
    }

    let tx = conn.transaction()?;
    let min_date = result.movements.iter().map(|m| m.date).min();
    let max_date = result.movements.iter().map(|m| m.date).max();
    tx.execute(
        "INSERT INTO batches (hash, algorithm, degraded, filename, bank_key, date_range_start, date_range_end) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            hash.value,
            hash.algorithm,
            hash.degraded,
            filename,
            result.detected_bank.as_ref().map(|b| b.bank_key.as_str()),
            min_date.map(|d| d.format("%Y-%m-%d").to_string()),
            max_date.map(|d| d.format("%Y-%m-%d").to_string()),
        ],
    )?;
    let batch_id = tx.last_insert_rowid();

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for m in &result.movements {
        let fingerprint = movement_fingerprint(m);
        if fingerprint_seen(&tx, &fingerprint, batch_id)? {
            skipped += 1;
            continue;
        }
        tx.execute(
            "INSERT INTO movements (batch_id, date, value_date, amount, description, counterparty, balance, original_row, fingerprint, raw_data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                batch_id,
                m.date.format("%Y-%m-%d").to_string(),
                m.value_date.map(|d| d.format("%Y-%m-%d").to_string()),
                m.amount,
                m.description,
                m.counterparty,
                m.balance,
                m.original_row_index as i64,
                fingerprint,
                serde_json::to_string(&m.raw_data)?,
            ],
        )?;
        inserted += 1;
    }

    tx.execute(
        "UPDATE batches SET movement_count = ?1, skipped_count = ?2 WHERE id = ?3",
        params![inserted as i64, skipped as i64, batch_id],
    )?;
    tx.commit()?;
    debug!("batch {batch_id} recorded: {inserted} movements, {skipped} already in ledger");

    Ok(RecordOutcome {
        batch_id: Some(batch_id),
        inserted,
        skipped,
        duplicate_batch: false,
    })
}

const SELECT_BATCH: &str = "SELECT id, hash, algorithm, degraded, filename, bank_key, movement_count, skipped_count, date_range_start, date_range_end, imported_at FROM batches";

fn batch_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BatchRecord> {
    Ok(BatchRecord {
        id: row.get(0)?,
        hash: row.get(1)?,
        algorithm: row.get(2)?,
        degraded: row.get(3)?,
        filename: row.get(4)?,
        bank_key: row.get(5)?,
        movement_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        skipped_count: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        date_range_start: row.get(8)?,
        date_range_end: row.get(9)?,
        imported_at: row.get(10)?,
    })
}

pub fn list_batches(conn: &Connection) -> Result<Vec<BatchRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_BATCH} ORDER BY id"))?;
    let rows = stmt
        .query_map([], batch_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn movement_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM movements", [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_hash::compute_batch_hash;
    use crate::models::SourceFile;
    use crate::pipeline::StatementParser;
    use crate::profiles::ProfileRegistry;
    use crate::settings::ParserConfig;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(dir.path()).unwrap();
        (dir, conn)
    }

    fn parsed(content: &str) -> (SourceFile, ParseResult) {
        let registry = ProfileRegistry::generic_only().unwrap();
        let parser = StatementParser::new(&registry, ParserConfig::default());
        let file = SourceFile::new("enero.csv", content.as_bytes().to_vec());
        let result = parser.try_parse(&file).unwrap();
        (file, result)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["batches", "movements"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_record_batch_and_reject_duplicate() {
        let (_dir, mut conn) = test_db();
        let (file, result) = parsed("Fecha;Concepto;Importe\n01/01/2024;Nómina;1.500,00\n02/01/2024;Café;-2,50\n");
        let hash = compute_batch_hash(&file);

        let first = record_batch(&mut conn, &file.name, &hash, &result).unwrap();
        assert!(!first.duplicate_batch);
        assert_eq!(first.inserted, 2);
        assert!(batch_exists(&conn, &hash.value).unwrap());

        let second = record_batch(&mut conn, &file.name, &hash, &result).unwrap();
        assert!(second.duplicate_batch);
        assert_eq!(second.batch_id, None);
        assert_eq!(movement_count(&conn).unwrap(), 2);

        let batches = list_batches(&conn).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].movement_count, 2);
        assert_eq!(batches[0].date_range_start.as_deref(), Some("2024-01-01"));
        assert_eq!(batches[0].date_range_end.as_deref(), Some("2024-01-02"));
        assert_eq!(batches[0].bank_key.as_deref(), Some("generic"));
    }

    #[test]
    fn test_overlapping_statement_skips_known_movements() {
        let (_dir, mut conn) = test_db();
        let (a, ra) = parsed("Fecha;Concepto;Importe\n01/01/2024;Nómina;1.500,00\n02/01/2024;Café;-2,50\n");
        record_batch(&mut conn, &a.name, &compute_batch_hash(&a), &ra).unwrap();

        let (b, rb) = parsed("Fecha;Concepto;Importe\n02/01/2024;Café;-2,50\n03/01/2024;Luz;-40,00\n");
        let outcome = record_batch(&mut conn, &b.name, &compute_batch_hash(&b), &rb).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(movement_count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_repeated_rows_within_one_batch_are_kept() {
        let (_dir, mut conn) = test_db();
        let (file, result) = parsed("Fecha;Concepto;Importe\n02/01/2024;Café;-2,50\n02/01/2024;Café;-2,50\n");
        let outcome = record_batch(&mut conn, &file.name, &compute_batch_hash(&file), &result).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_find_batch() {
        let (_dir, mut conn) = test_db();
        let (file, result) = parsed("Fecha;Importe\n01/01/2024;1,00\n");
        let hash = compute_batch_hash(&file);
        assert!(find_batch(&conn, &hash.value).unwrap().is_none());
        record_batch(&mut conn, &file.name, &hash, &result).unwrap();
        let found = find_batch(&conn, &hash.value).unwrap().unwrap();
        assert_eq!(found.filename, "enero.csv");
        assert_eq!(found.algorithm, "sha256");
        assert!(!found.degraded);
    }
}
