//! Error taxonomy for the draw engine.
//!
//! Every recoverable failure is reported to the presentation layer through
//! [`crate::events::DrawEvent`] as well as returned to the caller. None of these
//! errors leave the engine outside of a state from which `Idle` is reachable.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading or parsing a roster file.
///
/// The previously loaded roster is left untouched when this is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no valid names found (expected a delimited table: column 1 name, column 2 counter)")]
    NoEntries,
}

/// Failure while writing the roster back to disk.
///
/// Counter increments already committed in memory are not rolled back, so the
/// file may lag behind the in-memory roster until the next successful save.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write temporary file {}: {source}", path.display())]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to replace {} (rename: {rename}; copy: {source})", path.display())]
    Replace {
        path: PathBuf,
        rename: io::Error,
        #[source]
        source: io::Error,
    },
}

/// Rejected engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement} (got {value})")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by [`crate::engine::DrawEngine`] operations.
#[derive(Debug, Error)]
pub enum DrawError {
    /// Batch size out of range or nothing to draw from.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A batch is in flight; the request is rejected, not queued.
    #[error("a draw is already in progress")]
    Busy,
    /// A roster index outside the current roster. Signals a bug, not a user error.
    #[error("roster index {index} out of range (len {len})")]
    Index { index: usize, len: usize },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
