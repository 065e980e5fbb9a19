//! Error types for sf-output.

use thiserror::Error;

/// Errors that can occur when writing simulation output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Alias for `Result<T, OutputError>`.
pub type OutputResult<T> = Result<T, OutputError>;
