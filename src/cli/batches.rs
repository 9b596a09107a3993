use colored::Colorize;
use comfy_table::{Cell, Table};

use pulse_ingest::error::Result;
use pulse_ingest::fmt::short_hash;
use pulse_ingest::ledger::{get_connection, list_batches, DB_FILE};
use pulse_ingest::settings::get_data_dir;

pub fn run() -> Result<()> {
    let db_path = get_data_dir().join(DB_FILE);
    if !db_path.exists() {
        println!("No batches imported yet. Run `pulse import <FILE>` first.");
        return Ok(());
    }
    let conn = get_connection(&db_path)?;
    let batches = list_batches(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Bank", "Movements", "Skipped", "From", "To", "Hash", "Imported"]);
    for b in &batches {
        let hash = if b.degraded {
            format!("{} ({})", short_hash(&b.hash, 12), b.algorithm).yellow().to_string()
        } else {
            short_hash(&b.hash, 12).to_string()
        };
        table.add_row(vec![
            Cell::new(b.id),
            Cell::new(&b.filename),
            Cell::new(b.bank_key.as_deref().unwrap_or("")),
            Cell::new(b.movement_count),
            Cell::new(b.skipped_count),
            Cell::new(b.date_range_start.as_deref().unwrap_or("")),
            Cell::new(b.date_range_end.as_deref().unwrap_or("")),
            Cell::new(hash),
            Cell::new(&b.imported_at),
        ]);
    }
    println!("Batches\n{table}");
    Ok(())
}
