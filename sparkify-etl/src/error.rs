//! Error types for sparkify-etl
//!
//! Path-level and write-level failures are fatal and abort the run.
//! Field-level problems never reach this type; they are coerced to null at
//! parse time. A play event without matching song metadata is not an error.

use std::path::PathBuf;
use thiserror::Error;

/// ETL error type
#[derive(Debug, Error)]
pub enum EtlError {
    /// Input location matched zero files
    #[error("No source files found under {pattern}")]
    SourceNotFound { pattern: String },

    /// A source file is not valid JSON
    #[error("Parse error in {path} (record {record}): {message}")]
    Parse {
        path: PathBuf,
        record: usize,
        message: String,
    },

    /// Output table could not be written
    #[error("Failed to write table '{table}': {message}")]
    Write { table: String, message: String },

    /// Arrow encoding error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// sparkify-common error
    #[error("Common error: {0}")]
    Common(#[from] sparkify_common::Error),
}

impl EtlError {
    pub fn write(table: impl Into<String>, message: impl ToString) -> Self {
        Self::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for ETL operations
pub type EtlResult<T> = Result<T, EtlError>;
