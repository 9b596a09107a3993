use std::thread;

use log::{debug, info};
use serde::Serialize;

use crate::batch_hash::{compute_batch_hash_with, BatchHash, ContentDigest, Sha256Digest};
use crate::classifier::filter_rows;
use crate::error::{ErrorKind, IngestError, Result};
use crate::header::locate_header;
use crate::loader::{load_grid, LoadedGrid, SourceFormat};
use crate::models::{
    DetectedBank, ParseMetadata, ParseOutcome, ParseResult, RawGrid, SourceFile, SourceInfo,
};
use crate::movement::MovementBuilder;
use crate::profiles::ProfileRegistry;
use crate::settings::ParserConfig;

/// Parse outcome and batch hash for one file. The two are computed independently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub batch_hash: BatchHash,
    pub outcome: ParseOutcome,
}

/// Runs loader → header locator → profile detection → noise filter → movement builder.
///
/// Holds no mutable state, so one parser can serve many files at once.
pub struct StatementParser<'r> {
    registry: &'r ProfileRegistry,
    config: ParserConfig,
    digest: Option<Box<dyn ContentDigest>>,
}

impl<'r> StatementParser<'r> {
    pub fn new(registry: &'r ProfileRegistry, config: ParserConfig) -> Self {
        Self {
            registry,
            config,
            digest: Some(Box::new(Sha256Digest)),
        }
    }

    /// Replace the digest primitive; `None` forces the non-cryptographic fallback.
    pub fn with_digest(mut self, digest: Option<Box<dyn ContentDigest>>) -> Self {
        self.digest = digest;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, file: &SourceFile) -> ParseOutcome {
        self.try_parse(file).into()
    }

    pub fn try_parse(&self, file: &SourceFile) -> Result<ParseResult> {
        let loaded = load_grid(file, &self.config)?;
        self.parse_loaded(loaded, file.info())
    }

    /// Parse a grid that is already in memory.
    pub fn parse_grid(&self, rows: RawGrid, source: SourceInfo) -> Result<ParseResult> {
        let loaded = LoadedGrid {
            rows,
            format: SourceFormat::Delimited,
            delimiter: None,
            sheet_name: None,
            truncated_rows: 0,
        };
        self.parse_loaded(loaded, source)
    }

    fn parse_loaded(&self, loaded: LoadedGrid, source: SourceInfo) -> Result<ParseResult> {
        let rows = &loaded.rows;
        let header = locate_header(rows, self.config.header_scan_rows)?;
        let detected = self.registry.detect(&header.labels)?;
        let profile = detected.profile;

        let filtered = filter_rows(rows, header.row_index + 1, &profile.noise_patterns, &self.config);
        let builder = MovementBuilder::new(profile, &detected.mapping, &header.labels);

        let mut movements = Vec::with_capacity(filtered.rows.len());
        let mut row_errors = Vec::new();
        let mut invalid_rows = 0usize;
        for (index, cells) in &filtered.rows {
            match builder.build(*index, cells) {
                Ok(movement) => movements.push(movement),
                Err(errors) => {
                    invalid_rows += 1;
                    row_errors.extend(errors);
                }
            }
        }
        if movements.is_empty() {
            return Err(IngestError::NoValidMovements {
                invalid: invalid_rows,
            });
        }

        let mut warnings = Vec::new();
        if loaded.truncated_rows > 0 {
            warnings.push(format!(
                "Row limit of {} reached: {} trailing rows were not read",
                self.config.max_rows, loaded.truncated_rows
            ));
        }
        if let Some(stop) = filtered.stopped_at {
            warnings.push(format!(
                "Stopped at row {} after {} consecutive non-data rows",
                stop + 1,
                self.config.max_consecutive_noise
            ));
        }
        if detected.generic {
            warnings.push("No bank profile matched; used the generic profile".to_string());
        }

        info!(
            "{}: {} movements imported, {} rows omitted, {} invalid (profile {})",
            source.filename,
            movements.len(),
            filtered.omitted,
            invalid_rows,
            profile.bank_key
        );

        Ok(ParseResult {
            total_rows: rows.len() - header.row_index - 1,
            errors: row_errors.iter().map(ToString::to_string).collect(),
            row_errors,
            detected_bank: Some(DetectedBank {
                bank_key: profile.bank_key.clone(),
                bank_version: profile.bank_version.clone(),
                generic: detected.generic,
                profile: profile.clone(),
            }),
            metadata: ParseMetadata {
                header_row: header.row_index,
                headers: header.labels.clone(),
                mapping: detected.mapping.clone(),
                imported_rows: movements.len(),
                omitted_rows: filtered.omitted,
                invalid_rows,
                source,
                delimiter: loaded.delimiter,
                sheet_name: loaded.sheet_name.clone(),
                stopped_early_at: filtered.stopped_at,
                truncated_rows: loaded.truncated_rows,
                warnings,
            },
            movements,
        })
    }

    pub fn batch_hash(&self, file: &SourceFile) -> BatchHash {
        compute_batch_hash_with(file, self.digest.as_deref())
    }

    /// Hash and parse on separate threads. Neither result depends on the other.
    pub fn ingest(&self, file: &SourceFile) -> IngestReport {
        thread::scope(|s| {
            let hasher = s.spawn(|| self.batch_hash(file));
            let outcome = self.parse(file);
            let batch_hash = hasher
                .join()
                .unwrap_or_else(|_| compute_batch_hash_with(file, None));
            IngestReport {
                batch_hash,
                outcome,
            }
        })
    }

    /// Parse several files concurrently, at most one thread per available core.
    /// Outcomes keep the input order.
    pub fn parse_many(&self, files: &[SourceFile]) -> Vec<ParseOutcome> {
        let workers = thread::available_parallelism().map_or(1, |n| n.get());
        self.parse_many_with(files, workers)
    }

    /// `parse_many` with an explicit bound on concurrent parser threads.
    pub fn parse_many_with(&self, files: &[SourceFile], workers: usize) -> Vec<ParseOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for chunk in files.chunks(workers.max(1)) {
            thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|file| s.spawn(move || self.parse(file)))
                    .collect();
                for (handle, file) in handles.into_iter().zip(chunk) {
                    outcomes.push(handle.join().unwrap_or_else(|_| {
                        debug!("{}: parser thread panicked", file.name);
                        ParseOutcome::Failure {
                            kind: ErrorKind::Other,
                            message: format!("Parsing {} failed unexpectedly", file.name),
                        }
                    }));
                }
            });
        }
        outcomes
    }
}
