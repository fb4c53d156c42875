//! Row to point conversion

use crate::classify::{Classifier, TypedValue};
use crate::header::{ColumnRole, Header};
use tracing::warn;
use tsload_core::{Point, PointBuilder};

/// Outcome of mapping one row
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    /// The point, or `None` when the row produced no fields and was skipped
    pub point: Option<Point>,
    /// Cells that looked like timestamps but failed to parse
    pub invalid_timestamps: usize,
}

/// Converts raw rows into points using a validated header
#[derive(Debug, Clone)]
pub struct RecordMapper {
    measurement: String,
    header: Header,
    classifier: Classifier,
}

impl RecordMapper {
    pub fn new(measurement: impl Into<String>, header: Header, classifier: Classifier) -> Self {
        Self {
            measurement: measurement.into(),
            header,
            classifier,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Map one row; `row` is the 1-based data row number used in log messages.
    ///
    /// Cells are read positionally against the header. Empty cells are skipped,
    /// tags are stored verbatim and fields are classified. A timestamp that does
    /// not parse leaves the point without a timestamp.
    pub fn map<'a, I>(&self, cells: I, row: u64) -> MappedRow
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builder = PointBuilder::new(self.measurement.as_str());
        let mut invalid_timestamps = 0;

        for (column, cell) in self.header.columns().iter().zip(cells) {
            if cell.is_empty() {
                continue;
            }

            match column.role {
                ColumnRole::Tag => {
                    builder = builder.tag(column.name.as_str(), cell);
                }
                ColumnRole::Timestamp => match self.classifier.classify(cell, true) {
                    Ok(TypedValue::Timestamp(ts)) => builder = builder.timestamp(ts),
                    Ok(other) => {
                        invalid_timestamps += 1;
                        warn!(
                            "#{}: {}: not a timestamp ({:?}), leaving timestamp unset",
                            row, column.name, other
                        );
                    }
                    Err(e) => {
                        invalid_timestamps += 1;
                        warn!("#{}: {}: {}", row, column.name, e);
                    }
                },
                ColumnRole::Field => match self.classifier.classify(cell, false) {
                    Ok(value) => {
                        if let Some(value) = value.into_field_value() {
                            builder = builder.field(column.name.as_str(), value);
                        }
                    }
                    Err(e) => {
                        invalid_timestamps += 1;
                        warn!("#{}: {}: {}", row, column.name, e);
                    }
                },
            }
        }

        let point = match builder.build() {
            Ok(point) => Some(point),
            Err(e) => {
                warn!("#{}: skipping row: {}", row, e);
                None
            }
        };

        MappedRow {
            point,
            invalid_timestamps,
        }
    }
}
