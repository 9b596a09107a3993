use comfy_table::{Cell, Table};

use pulse_ingest::error::Result;
use pulse_ingest::models::CanonicalField;
use pulse_ingest::settings::load_settings;

use super::load_registry;

pub fn run(profiles: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let registry = load_registry(profiles, &settings)?;

    let mut table = Table::new();
    table.set_header(vec!["Key", "Version", "Name", "Fields", "Min Score", "Decimal", "Date Formats"]);
    for profile in registry.profiles().iter().chain(std::iter::once(registry.generic())) {
        let fields: Vec<&str> = CanonicalField::ALL
            .iter()
            .filter(|f| profile.header_aliases.get(*f).is_some_and(|a| !a.is_empty()))
            .map(|f| f.key())
            .collect();
        let hints: Vec<String> = profile.date_hints.iter().map(|h| h.pattern()).collect();
        table.add_row(vec![
            Cell::new(&profile.bank_key),
            Cell::new(profile.bank_version.as_deref().unwrap_or("")),
            Cell::new(profile.name()),
            Cell::new(fields.join(", ")),
            Cell::new(profile.min_score),
            Cell::new(profile.number_format.decimal_separator),
            Cell::new(hints.join(", ")),
        ]);
    }
    println!("Bank profiles\n{table}");
    Ok(())
}
