//! tsload core - Point types shared by the loader
//!
//! This crate provides the data types a converted CSV row ends up as:
//! - `Timestamp`: Nanosecond-precision Unix epoch timestamps
//! - `Tag`: Key-value pair for series identification
//! - `FieldValue`: Typed field values (Float, Integer, Boolean, String, Timestamp)
//! - `Field`: Named field with a value
//! - `Point`: A single data point with an optional timestamp, tags, and fields

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;
