use pulse_ingest::error::Result;
use pulse_ingest::fmt::format_bytes;
use pulse_ingest::settings::{load_settings, save_settings, settings_path};

pub fn run(init: bool) -> Result<()> {
    let settings = load_settings();
    let path = settings_path();
    if init {
        save_settings(&settings)?;
        println!("Wrote {}", path.display());
    }

    let parser = &settings.parser;
    println!("Settings:      {}{}", path.display(), if path.exists() { "" } else { " (not found, using defaults)" });
    println!("Data dir:      {}", settings.data_dir);
    println!("Profiles:      {}", settings.profiles_path.as_deref().unwrap_or("(built-in)"));
    println!("Max file size: {}", format_bytes(parser.max_file_bytes));
    println!("Max rows:      {}", parser.max_rows);
    println!("Header scan:   {} rows", parser.header_scan_rows);
    println!(
        "Early stop:    {} noise rows after {} valid rows",
        parser.max_consecutive_noise, parser.min_valid_before_stop
    );
    if let Some(sheet) = &parser.sheet_name {
        println!("Sheet:         {sheet}");
    }
    Ok(())
}
