//! Timestamp layouts written against the reference instant
//!
//! A layout spells out how the instant `2006-01-02 15:04:05` (Monday, January 2nd,
//! offset `-0700`) would be printed. For example `2006-01-02 15:04:05` means
//! `YYYY-MM-DD hh:mm:ss` and `02/01/2006 3:04PM` means `DD/MM/YYYY h:mmAM`.
//!
//! Each layout is translated once into:
//! - a chrono format string used to parse matching cells
//! - an anchored match pattern where every digit of the layout becomes `[0-9]`,
//!   which decides whether a cell looks like a timestamp at all
//!
//! The literal layout `unix` selects integer epoch timestamps instead.

use crate::error::{ImportError, Result, TimestampError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tsload_core::Timestamp;

/// Sentinel layout selecting integer epoch timestamps
pub const UNIX_LAYOUT: &str = "unix";

/// Default layout, `YYYY-MM-DD hh:mm:ss`
pub const DEFAULT_LAYOUT: &str = "2006-01-02 15:04:05";

/// Reference-time chunks and their chrono equivalents, longest first so that
/// e.g. `2006` wins over `2` and `January` over `Jan`.
const CHUNKS: &[(&str, &str, Part)] = &[
    ("January", "%B", Part::Date),
    ("Monday", "%A", Part::Date),
    ("-07:00", "%:z", Part::Offset),
    ("-0700", "%z", Part::Offset),
    ("2006", "%Y", Part::Date),
    ("Jan", "%b", Part::Date),
    ("Mon", "%a", Part::Date),
    ("002", "%j", Part::Date),
    ("_2", "%e", Part::Date),
    ("01", "%m", Part::Date),
    ("02", "%d", Part::Date),
    ("06", "%y", Part::Date),
    ("15", "%H", Part::Time),
    ("03", "%I", Part::Time),
    ("04", "%M", Part::Time),
    ("05", "%S", Part::Time),
    ("PM", "%p", Part::Time),
    ("pm", "%p", Part::Time),
    ("1", "%m", Part::Date),
    ("2", "%d", Part::Date),
    ("3", "%I", Part::Time),
    ("4", "%M", Part::Time),
    ("5", "%S", Part::Time),
];

/// Chunks chrono cannot parse back
const UNSUPPORTED: &[&str] = &["Z07:00", "Z0700", "MST"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Date,
    Time,
    Offset,
}

/// A compiled timestamp layout
#[derive(Debug, Clone)]
pub enum TimeLayout {
    /// Integer offsets from the Unix epoch
    Unix,
    /// Reference-time layout
    Reference(ReferenceLayout),
}

impl TimeLayout {
    /// Compile a layout string
    pub fn new(layout: &str) -> Result<Self> {
        if layout == UNIX_LAYOUT {
            Ok(TimeLayout::Unix)
        } else {
            ReferenceLayout::new(layout).map(TimeLayout::Reference)
        }
    }
}

/// A reference-time layout translated for chrono
#[derive(Debug, Clone)]
pub struct ReferenceLayout {
    layout: String,
    format: String,
    pattern: Regex,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
}

impl ReferenceLayout {
    /// Translate a layout string
    pub fn new(layout: &str) -> Result<Self> {
        if layout.is_empty() {
            return Err(ImportError::Config("timestamp format must not be empty".into()));
        }

        let mut format = String::with_capacity(layout.len() * 2);
        let (mut has_date, mut has_time, mut has_offset) = (false, false, false);
        let mut rest = layout;

        'scan: while !rest.is_empty() {
            for unsupported in UNSUPPORTED {
                if rest.starts_with(unsupported) {
                    return Err(ImportError::Config(format!(
                        "timestamp format chunk '{}' is not supported in '{}'",
                        unsupported, layout
                    )));
                }
            }

            if let Some((directive, len)) = fractional_seconds(rest) {
                format.push_str(directive);
                has_time = true;
                rest = &rest[len..];
                continue;
            }

            for (chunk, directive, part) in CHUNKS {
                if rest.starts_with(chunk) {
                    format.push_str(directive);
                    match part {
                        Part::Date => has_date = true,
                        Part::Time => has_time = true,
                        Part::Offset => has_offset = true,
                    }
                    rest = &rest[chunk.len()..];
                    continue 'scan;
                }
            }

            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                if c == '%' {
                    format.push_str("%%");
                } else {
                    format.push(c);
                }
            }
            rest = chars.as_str();
        }

        Ok(Self {
            layout: layout.to_string(),
            format,
            pattern: digit_pattern(layout)?,
            has_date,
            has_time,
            has_offset,
        })
    }

    /// Whether a cell has the shape of this layout
    pub fn matches(&self, cell: &str) -> bool {
        self.pattern.is_match(cell)
    }

    /// Parse a cell into nanoseconds since the epoch.
    ///
    /// Layouts without an offset are read as UTC. Date-only layouts resolve to
    /// midnight and time-only layouts to 1970-01-01.
    pub fn parse(&self, cell: &str) -> std::result::Result<Timestamp, TimestampError> {
        let fail = |reason: String| TimestampError {
            value: cell.to_string(),
            reason: format!("{} (layout '{}')", reason, self.layout),
        };

        let datetime = if self.has_offset {
            DateTime::parse_from_str(cell, &self.format)
                .map(|dt| dt.naive_utc())
                .map_err(|e| fail(e.to_string()))?
        } else if self.has_date && self.has_time {
            NaiveDateTime::parse_from_str(cell, &self.format).map_err(|e| fail(e.to_string()))?
        } else if self.has_date {
            NaiveDate::parse_from_str(cell, &self.format)
                .map_err(|e| fail(e.to_string()))?
                .and_time(NaiveTime::default())
        } else {
            let time =
                NaiveTime::parse_from_str(cell, &self.format).map_err(|e| fail(e.to_string()))?;
            NaiveDate::default().and_time(time)
        };

        datetime
            .and_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| fail("out of range for nanosecond timestamps".to_string()))
    }
}

/// `.000`, `.000000`, `.000000000` give fixed-width fractions, a run of 9s an
/// optional fraction of any width. Returns the chrono directive and chunk length.
fn fractional_seconds(rest: &str) -> Option<(&'static str, usize)> {
    let bytes = rest.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'.' || !(bytes[1] == b'0' || bytes[1] == b'9') {
        return None;
    }
    let digit = bytes[1];
    let run = bytes[1..].iter().take_while(|b| **b == digit).count();
    if bytes.get(run + 1).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    let directive = match (digit, run) {
        (b'9', _) => "%.f",
        (_, 3) => "%.3f",
        (_, 6) => "%.6f",
        (_, 9) => "%.9f",
        _ => return None,
    };
    Some((directive, run + 1))
}

/// Every digit of the layout becomes an ASCII digit class, everything else is literal
fn digit_pattern(layout: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    for c in layout.chars() {
        if c.is_ascii_digit() {
            pattern.push_str("[0-9]");
        } else {
            let mut buf = [0u8; 4];
            pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|e| ImportError::Config(format!("timestamp pattern creation failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(s: &str) -> ReferenceLayout {
        ReferenceLayout::new(s).unwrap()
    }

    #[test]
    fn test_default_layout_translation() {
        let l = layout(DEFAULT_LAYOUT);
        assert_eq!(l.format, "%Y-%m-%d %H:%M:%S");
        assert!(l.matches("2024-01-01 00:00:00"));
        assert!(!l.matches("2024-01-01"));
        assert!(!l.matches("2024-01-01 00:00:00 "));
        assert!(!l.matches("2024/01/01 00:00:00"));
        // Only ASCII digits count
        assert!(!l.matches("٢٠٢٤-٠١-٠١ ٠٠:٠٠:٠٠"));
    }

    #[test]
    fn test_parse_default_layout() {
        let l = layout(DEFAULT_LAYOUT);
        assert_eq!(l.parse("2024-01-01 00:00:00"), Ok(1_704_067_200_000_000_000));
        assert_eq!(l.parse("2024-01-01 00:00:01"), Ok(1_704_067_201_000_000_000));
    }

    #[test]
    fn test_shape_match_but_invalid_value() {
        let l = layout(DEFAULT_LAYOUT);
        assert!(l.matches("2024-13-45 99:00:00"));
        let err = l.parse("2024-13-45 99:00:00").unwrap_err();
        assert_eq!(err.value, "2024-13-45 99:00:00");
    }

    #[test]
    fn test_other_layouts() {
        let l = layout("02/01/2006");
        assert_eq!(l.format, "%d/%m/%Y");
        assert_eq!(l.parse("02/01/2024"), Ok(1_704_153_600_000_000_000));

        let l = layout("2006-01-02T15:04:05.000");
        assert_eq!(l.format, "%Y-%m-%dT%H:%M:%S%.3f");
        assert_eq!(l.parse("2024-01-01T00:00:00.250"), Ok(1_704_067_200_250_000_000));

        let l = layout("2006-01-02 15:04:05 -0700");
        assert_eq!(l.format, "%Y-%m-%d %H:%M:%S %z");
        assert_eq!(l.parse("2024-01-01 02:00:00 +0200"), Ok(1_704_067_200_000_000_000));

        let l = layout("Jan _2 2006");
        assert_eq!(l.format, "%b %e %Y");
    }

    #[test]
    fn test_percent_is_literal() {
        let l = layout("2006%01");
        assert_eq!(l.format, "%Y%%%m");
        assert!(l.matches("2024%01"));
    }

    #[test]
    fn test_unsupported_chunks_rejected() {
        assert!(ReferenceLayout::new("2006-01-02 15:04:05 MST").is_err());
        assert!(ReferenceLayout::new("2006-01-02T15:04:05Z07:00").is_err());
        assert!(ReferenceLayout::new("").is_err());
    }

    #[test]
    fn test_unix_sentinel() {
        assert!(matches!(TimeLayout::new("unix").unwrap(), TimeLayout::Unix));
        assert!(matches!(
            TimeLayout::new(DEFAULT_LAYOUT).unwrap(),
            TimeLayout::Reference(_)
        ));
    }
}
