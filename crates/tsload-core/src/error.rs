//! Error types for tsload-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("Empty measurement name")]
    EmptyMeasurement,

    #[error("Empty tag key")]
    EmptyTagKey,

    #[error("Empty field key")]
    EmptyFieldKey,

    #[error("No fields provided")]
    NoFields,

    #[error("Key '{0}' used as both tag and field")]
    KeyConflict(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
