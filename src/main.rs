mod cli;

use clap::Parser;
use log::LevelFilter;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Parse {
            file,
            profiles,
            json,
        } => cli::parse::run(&file, profiles.as_deref(), json),
        Commands::Hash { file } => cli::hash::run(&file),
        Commands::Import { file, profiles } => cli::import::run(&file, profiles.as_deref()),
        Commands::Profiles { profiles } => cli::profiles::run(profiles.as_deref()),
        Commands::Batches => cli::batches::run(),
        Commands::Config { init } => cli::config::run(init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
