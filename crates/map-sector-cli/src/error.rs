use map_sector_lib::IndexError;
use std::path::PathBuf;

/// Error types for the command-line harness
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

pub type Result<T> = std::result::Result<T, CliError>;
