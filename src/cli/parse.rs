use colored::Colorize;
use comfy_table::{Cell, Table};

use pulse_ingest::error::Result;
use pulse_ingest::fmt::{amount, format_bytes, optional_amount};
use pulse_ingest::models::{ParseOutcome, ParseResult};
use pulse_ingest::pipeline::StatementParser;
use pulse_ingest::settings::load_settings;

use super::{load_registry, read_source};

pub fn run(file: &str, profiles: Option<&str>, json: bool) -> Result<()> {
    let settings = load_settings();
    let registry = load_registry(profiles, &settings)?;
    let parser = StatementParser::new(&registry, settings.parser.clone());

    if json {
        let outcome: ParseOutcome = read_source(file, parser.config())
            .and_then(|source| parser.try_parse(&source))
            .into();
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let source = read_source(file, parser.config())?;
    let result = parser.try_parse(&source)?;
    print_movements(&result);
    print_summary(&result);
    Ok(())
}

pub(crate) fn print_movements(result: &ParseResult) {
    let mut table = Table::new();
    table.set_header(vec!["Row", "Date", "Value Date", "Description", "Counterparty", "Amount", "Balance"]);
    for m in &result.movements {
        let value = if m.amount < 0.0 {
            amount(m.amount).red().to_string()
        } else {
            amount(m.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(m.original_row_index + 1),
            Cell::new(m.date.format("%Y-%m-%d")),
            Cell::new(m.value_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()),
            Cell::new(&m.description),
            Cell::new(m.counterparty.as_deref().unwrap_or("")),
            Cell::new(value),
            Cell::new(optional_amount(m.balance)),
        ]);
    }
    println!("{table}");
}

pub(crate) fn print_summary(result: &ParseResult) {
    let meta = &result.metadata;
    if let Some(bank) = &result.detected_bank {
        let label = if bank.generic {
            format!("{} (generic)", bank.profile.name()).yellow().to_string()
        } else {
            bank.profile.name().bold().to_string()
        };
        println!("Profile:   {label}");
    }
    println!(
        "Source:    {} ({})",
        meta.source.filename,
        format_bytes(meta.source.size)
    );
    println!("Header:    row {}", meta.header_row + 1);
    println!(
        "Rows:      {} imported, {} omitted, {} invalid",
        meta.imported_rows.to_string().green(),
        meta.omitted_rows,
        if meta.invalid_rows > 0 {
            meta.invalid_rows.to_string().red().to_string()
        } else {
            meta.invalid_rows.to_string()
        }
    );
    let total: f64 = result.movements.iter().map(|m| m.amount).sum();
    println!("Net:       {}", amount(total).bold());
    for warning in &meta.warnings {
        println!("{} {warning}", "warning:".yellow());
    }
    for error in &result.errors {
        println!("{} {error}", "invalid:".red());
    }
}
