//! Error types for the importer

use thiserror::Error;

/// Importer errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Row {row} has {actual} cells, header has {expected}")]
    RowLength {
        row: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Point error: {0}")]
    Point(#[from] tsload_core::CoreError),

    #[error("Write failed after {attempts} attempts: {source}")]
    WriteExhausted {
        attempts: u32,
        #[source]
        source: Box<ImportError>,
    },

    #[error("Import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Whether resending the same batch could succeed.
    ///
    /// Transport, server and connectivity failures are transient. Local
    /// failures such as a closed output stream repeat on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::Http(_) | ImportError::Server { .. } | ImportError::Connectivity(_)
        )
    }
}

/// Header validation failures, all fatal before any row is read
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("at least one field (non-tag, non-timestamp) column is required")]
    NoFieldColumn,

    #[error("timestamp column ({column}) does not match any header ({headers})")]
    MissingTimestampColumn { column: String, headers: String },

    #[error("tag columns ({missing}) do not all have matching headers ({headers})")]
    MissingTagColumns { missing: String, headers: String },

    #[error("header column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("header column {0} has no name")]
    EmptyColumnName(usize),
}

/// Timestamp cell that matched the layout but could not be parsed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid time '{value}': {reason}")]
pub struct TimestampError {
    pub value: String,
    pub reason: String,
}

/// Result type for importer operations
pub type Result<T> = std::result::Result<T, ImportError>;
