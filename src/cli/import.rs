use colored::Colorize;

use pulse_ingest::error::{IngestError, Result};
use pulse_ingest::ledger::{self, record_batch};
use pulse_ingest::models::ParseOutcome;
use pulse_ingest::pipeline::StatementParser;
use pulse_ingest::settings::{get_data_dir, load_settings};

use super::parse::print_summary;
use super::{load_registry, read_source};

pub fn run(file: &str, profiles: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let registry = load_registry(profiles, &settings)?;
    let parser = StatementParser::new(&registry, settings.parser.clone());
    let source = read_source(file, parser.config())?;

    let mut conn = ledger::open(&get_data_dir())?;
    let report = parser.ingest(&source);
    if let Some(existing) = ledger::find_batch(&conn, &report.batch_hash.value)? {
        println!(
            "This file has already been imported as batch {} ({}, {}).",
            existing.id, existing.filename, existing.imported_at
        );
        return Ok(());
    }

    let result = match report.outcome {
        ParseOutcome::Success(result) => result,
        ParseOutcome::Failure { message, .. } => {
            return Err(IngestError::Other(format!("{}: {message}", source.name)))
        }
    };
    if report.batch_hash.degraded {
        println!("{}", "warning: batch hash uses the non-cryptographic fallback".yellow());
    }

    let outcome = record_batch(&mut conn, &source.name, &report.batch_hash, &result)?;
    if outcome.duplicate_batch {
        println!("This file has already been imported (duplicate batch hash).");
        return Ok(());
    }

    print_summary(&result);
    println!(
        "{} imported, {} skipped (already in ledger)",
        outcome.inserted, outcome.skipped
    );
    Ok(())
}
