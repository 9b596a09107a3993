pub mod batch_hash;
pub mod classifier;
pub mod error;
pub mod fmt;
pub mod header;
pub mod ledger;
pub mod loader;
pub mod models;
pub mod movement;
pub mod normalize;
pub mod pipeline;
pub mod profiles;
pub mod settings;

pub use batch_hash::{compute_batch_hash, movement_fingerprint, BatchHash};
pub use error::{ErrorKind, IngestError, Result};
pub use models::{
    CanonicalField, Cell, ParseOutcome, ParseResult, ParsedMovement, RawGrid, SourceFile,
};
pub use pipeline::{IngestReport, StatementParser};
pub use profiles::{BankProfile, ProfileRegistry};
pub use settings::ParserConfig;
