use colored::Colorize;

use pulse_ingest::batch_hash::compute_batch_hash;
use pulse_ingest::error::Result;
use pulse_ingest::settings::load_settings;

use super::read_source;

pub fn run(file: &str) -> Result<()> {
    let settings = load_settings();
    let source = read_source(file, &settings.parser)?;
    let hash = compute_batch_hash(&source);
    println!("{}  {}", hash.value, source.name);
    if hash.degraded {
        println!("{}", format!("{} (non-cryptographic fallback)", hash.algorithm).yellow());
    } else {
        println!("{}", hash.algorithm.dimmed());
    }
    Ok(())
}
