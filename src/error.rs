//! Export error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The picks source exists but is not a JSON array.
    #[error("Malformed picks file {path}: {source}")]
    MalformedPicks {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Monitor database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type ExportResult<T> = Result<T, ExportError>;
