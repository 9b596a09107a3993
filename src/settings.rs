use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Limits and heuristics for one parse. The defaults are the documented production values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub max_file_bytes: u64,
    pub max_rows: usize,
    pub header_scan_rows: usize,
    /// Valid rows required before the noise early-stop can trigger.
    pub min_valid_before_stop: usize,
    /// Consecutive noise rows that end the data region.
    pub max_consecutive_noise: usize,
    pub sheet_name: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 8 * 1024 * 1024,
            max_rows: 50_000,
            header_scan_rows: 40,
            min_valid_before_stop: 5,
            max_consecutive_noise: 3,
            sheet_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// External bank profile registry; the built-in one is used when unset.
    #[serde(default)]
    pub profiles_path: Option<String>,
    #[serde(default)]
    pub parser: ParserConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            profiles_path: None,
            parser: ParserConfig::default(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pulse")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("pulse")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| IngestError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(shellexpand_path(&load_settings().data_dir))
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
