pub mod batches;
pub mod config;
pub mod hash;
pub mod import;
pub mod parse;
pub mod profiles;

use std::path::Path;

use clap::{Parser, Subcommand};
use log::debug;

use pulse_ingest::error::Result;
use pulse_ingest::models::SourceFile;
use pulse_ingest::profiles::ProfileRegistry;
use pulse_ingest::settings::{shellexpand_path, ParserConfig, Settings};

#[derive(Parser)]
#[command(name = "pulse", about = "Parse, fingerprint and import bank statement exports.")]
pub struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a statement (CSV/TXT/XLSX/XLS/ODS) and show its movements.
    Parse {
        /// Path to the statement file
        file: String,
        /// Bank profile registry JSON (default: settings or built-in)
        #[arg(long)]
        profiles: Option<String>,
        /// Print the full parse outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the batch hash (idempotency key) of a file.
    Hash {
        /// Path to the statement file
        file: String,
    },
    /// Parse a statement and record it in the ledger, rejecting files already imported.
    Import {
        /// Path to the statement file
        file: String,
        /// Bank profile registry JSON (default: settings or built-in)
        #[arg(long)]
        profiles: Option<String>,
    },
    /// List the bank profiles of a registry.
    Profiles {
        /// Bank profile registry JSON (default: settings or built-in)
        #[arg(long)]
        profiles: Option<String>,
    },
    /// List imported batches.
    Batches,
    /// Show the effective settings.
    Config {
        /// Write the effective settings to the settings file
        #[arg(long)]
        init: bool,
    },
}

/// Registry from `--profiles`, then `profiles_path` in settings, then the built-in one.
pub(crate) fn load_registry(explicit: Option<&str>, settings: &Settings) -> Result<ProfileRegistry> {
    match explicit.or(settings.profiles_path.as_deref()) {
        Some(path) => {
            let path = shellexpand_path(path);
            debug!("loading bank profiles from {path}");
            ProfileRegistry::from_path(Path::new(&path))
        }
        None => ProfileRegistry::builtin(),
    }
}

pub(crate) fn read_source(file: &str, config: &ParserConfig) -> Result<SourceFile> {
    SourceFile::from_path(Path::new(file), config.max_file_bytes)
}
