//! Header validation and column roles

use crate::error::HeaderError;
use std::collections::HashSet;

/// What a column contributes to a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Timestamp,
    Tag,
    Field,
}

/// A named column with its role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub role: ColumnRole,
}

/// Validated header, positionally aligned with every row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    columns: Vec<Column>,
    first_field: String,
}

impl Header {
    /// Assign a role to every header cell.
    ///
    /// The timestamp column wins over a tag of the same name, so such a tag is
    /// reported as unmatched.
    pub fn validate<I, S>(
        header_row: I,
        tag_names: &HashSet<String>,
        timestamp_column: &str,
    ) -> Result<Self, HeaderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = header_row.into_iter().map(Into::into).collect();

        let mut seen = HashSet::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(HeaderError::EmptyColumnName(index + 1));
            }
            if !seen.insert(name.as_str()) {
                return Err(HeaderError::DuplicateColumn(name.clone()));
            }
        }

        let mut unmatched_tags = tag_names.clone();
        let mut has_timestamp = false;
        let mut first_field: Option<String> = None;
        let mut columns = Vec::with_capacity(names.len());

        for name in &names {
            let role = if name == timestamp_column {
                has_timestamp = true;
                ColumnRole::Timestamp
            } else if unmatched_tags.remove(name) {
                ColumnRole::Tag
            } else {
                if first_field.is_none() {
                    first_field = Some(name.clone());
                }
                ColumnRole::Field
            };
            columns.push(Column {
                name: name.clone(),
                role,
            });
        }

        let Some(first_field) = first_field else {
            return Err(HeaderError::NoFieldColumn);
        };

        if !has_timestamp {
            return Err(HeaderError::MissingTimestampColumn {
                column: timestamp_column.to_string(),
                headers: names.join(","),
            });
        }

        if !unmatched_tags.is_empty() {
            let mut missing: Vec<_> = unmatched_tags.into_iter().collect();
            missing.sort();
            return Err(HeaderError::MissingTagColumns {
                missing: missing.join(","),
                headers: names.join(","),
            });
        }

        Ok(Self {
            columns,
            first_field,
        })
    }

    /// Columns in file order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns every row must have
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Name of the first field column, used for row-count queries
    pub fn first_field(&self) -> &str {
        &self.first_field
    }
}
