//! Core data types for tsload

use crate::error::{CoreError, Result};
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Nanosecond-precision Unix epoch timestamp
pub type Timestamp = i64;

/// Render a timestamp as an RFC 3339 string in UTC
pub fn format_timestamp(ts: Timestamp) -> String {
    Utc.timestamp_nanos(ts)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// A tag is a key-value pair used for series identification
/// Tags are indexed and never type-converted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the tag
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CoreError::EmptyTagKey);
        }
        Ok(())
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.key.cmp(&other.key) {
            Ordering::Equal => self.value.cmp(&other.value),
            other => other,
        }
    }
}

/// Field value types a classified cell can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 64-bit floating point
    Float(f64),
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean value
    Boolean(bool),
    /// UTF-8 string
    String(String),
    /// Instant parsed from a cell matching the timestamp layout
    Timestamp(Timestamp),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

/// A field is a named value in a data point
/// Fields are not indexed and store the actual measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    /// Create a new field
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the field
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CoreError::EmptyFieldKey);
        }
        Ok(())
    }
}

/// A data point represents a single record at a specific time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The measurement name (like a table name)
    pub measurement: String,
    /// Timestamp in nanoseconds since Unix epoch, `None` when the store should assign one
    pub timestamp: Option<Timestamp>,
    /// Tags for series identification (indexed)
    pub tags: Vec<Tag>,
    /// Field values (not indexed)
    pub fields: Vec<Field>,
}

impl Point {
    /// Create a new point builder
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder::new(measurement)
    }

    /// Validate the point
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(CoreError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(CoreError::NoFields);
        }
        for tag in &self.tags {
            tag.validate()?;
        }
        for field in &self.fields {
            field.validate()?;
            if self.tags.iter().any(|t| t.key == field.key) {
                return Err(CoreError::KeyConflict(field.key.clone()));
            }
        }
        Ok(())
    }

    /// Get a tag value by key
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Get a field value by key
    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

/// Builder for constructing Points
///
/// Setting a tag or field key twice keeps the last value.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    timestamp: Option<Timestamp>,
    tags: Vec<Tag>,
    fields: Vec<Field>,
}

impl PointBuilder {
    /// Create a new point builder
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp: None,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the timestamp
    pub fn timestamp(mut self, ts: Timestamp) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let tag = Tag::new(key, value);
        match self.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
        self
    }

    /// Add a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let field = Field::new(key, value);
        match self.fields.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => existing.value = field.value,
            None => self.fields.push(field),
        }
        self
    }

    /// Build the point
    pub fn build(mut self) -> Result<Point> {
        // Line protocol expects tags in key order
        self.tags.sort();

        let point = Point {
            measurement: self.measurement,
            timestamp: self.timestamp,
            tags: self.tags,
            fields: self.fields,
        };

        point.validate()?;
        Ok(point)
    }
}
