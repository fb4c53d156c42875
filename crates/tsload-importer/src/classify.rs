//! Cell type inference
//!
//! Every CSV cell is raw text. The [`Classifier`] turns one cell into a
//! [`TypedValue`] by trying a fixed list of rules in priority order:
//!
//! 1. empty cell → `Null`
//! 2. cell shaped like the timestamp layout → `Timestamp`
//! 3. timestamp column with the `unix` layout → integer nanoseconds
//! 4. `^[0-9]+$` → `Integer` (unless force-float or force-string)
//! 5. signed decimal with optional exponent → `Float` (unless force-string)
//! 6. `true|T|True|TRUE` → `Boolean(true)`
//! 7. `false|F|False|FALSE` → `Boolean(false)`
//! 8. `null|Null|NULL` → `Null` (only with the null-token option)
//! 9. anything else → `String`
//!
//! The patterns are compiled once and shared read-only for the whole run.

use crate::error::{ImportError, Result, TimestampError};
use crate::layout::TimeLayout;
use regex::Regex;
use tsload_core::{FieldValue, Timestamp};

/// Options that change which rules apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// Skip the integer rule so digit strings become floats
    pub force_float: bool,
    /// Skip the integer and float rules so numbers stay strings
    pub force_string: bool,
    /// Drop `null` tokens instead of storing them as strings
    pub treat_null: bool,
}

/// Result of classifying one cell
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(Timestamp),
    String(String),
}

impl TypedValue {
    /// Convert into a storable field value; `Null` has none
    pub fn into_field_value(self) -> Option<FieldValue> {
        match self {
            TypedValue::Null => None,
            TypedValue::Integer(v) => Some(FieldValue::Integer(v)),
            TypedValue::Float(v) => Some(FieldValue::Float(v)),
            TypedValue::Boolean(v) => Some(FieldValue::Boolean(v)),
            TypedValue::Timestamp(v) => Some(FieldValue::Timestamp(v)),
            TypedValue::String(v) => Some(FieldValue::String(v)),
        }
    }
}

/// Compiled classification rules
#[derive(Debug, Clone)]
pub struct Classifier {
    layout: TimeLayout,
    options: ClassifierOptions,
    integer_re: Regex,
    float_re: Regex,
    true_re: Regex,
    false_re: Regex,
    null_re: Regex,
}

impl Classifier {
    /// Compile the rules for a timestamp layout and option set
    pub fn new(layout: &str, options: ClassifierOptions) -> Result<Self> {
        Ok(Self {
            layout: TimeLayout::new(layout)?,
            options,
            integer_re: compile(r"^[0-9]+$")?,
            float_re: compile(r"^[-+]?[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?$")?,
            true_re: compile(r"^(true|T|True|TRUE)$")?,
            false_re: compile(r"^(false|F|False|FALSE)$")?,
            null_re: compile(r"^(null|Null|NULL)$")?,
        })
    }

    /// Classify one cell.
    ///
    /// `timestamp_column` selects the `unix` rule. An `Err` means the cell looked
    /// like a timestamp but did not parse; callers treat the cell as absent.
    pub fn classify(
        &self,
        cell: &str,
        timestamp_column: bool,
    ) -> std::result::Result<TypedValue, TimestampError> {
        if cell.is_empty() {
            return Ok(TypedValue::Null);
        }

        match &self.layout {
            TimeLayout::Reference(layout) if layout.matches(cell) => {
                return layout.parse(cell).map(TypedValue::Timestamp);
            }
            TimeLayout::Unix if timestamp_column => {
                // Read as nanoseconds, not seconds
                return cell
                    .parse::<i64>()
                    .map(TypedValue::Timestamp)
                    .map_err(|e| TimestampError {
                        value: cell.to_string(),
                        reason: e.to_string(),
                    });
            }
            _ => {}
        }

        let ClassifierOptions {
            force_float,
            force_string,
            treat_null,
        } = self.options;

        if !force_float && !force_string && self.integer_re.is_match(cell) {
            // Digit strings beyond i64 fall through to the float rule
            if let Ok(v) = cell.parse::<i64>() {
                return Ok(TypedValue::Integer(v));
            }
        }

        if !force_string && self.float_re.is_match(cell) {
            match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => return Ok(TypedValue::Float(v)),
                _ => {}
            }
        }

        if self.true_re.is_match(cell) {
            return Ok(TypedValue::Boolean(true));
        }

        if self.false_re.is_match(cell) {
            return Ok(TypedValue::Boolean(false));
        }

        if treat_null && self.null_re.is_match(cell) {
            return Ok(TypedValue::Null);
        }

        Ok(TypedValue::String(cell.to_string()))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ImportError::Config(format!("invalid pattern {}: {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DEFAULT_LAYOUT;

    fn classifier(options: ClassifierOptions) -> Classifier {
        Classifier::new(DEFAULT_LAYOUT, options).unwrap()
    }

    fn classify(cell: &str) -> TypedValue {
        classifier(ClassifierOptions::default())
            .classify(cell, false)
            .unwrap()
    }

    #[test]
    fn test_basic_rules() {
        assert_eq!(classify(""), TypedValue::Null);
        assert_eq!(classify("42"), TypedValue::Integer(42));
        assert_eq!(classify("93.5"), TypedValue::Float(93.5));
        assert_eq!(classify("-3"), TypedValue::Float(-3.0));
        assert_eq!(classify(".5"), TypedValue::Float(0.5));
        assert_eq!(classify("1e3"), TypedValue::Float(1000.0));
        assert_eq!(classify("+2.5E-1"), TypedValue::Float(0.25));
        assert_eq!(classify("true"), TypedValue::Boolean(true));
        assert_eq!(classify("T"), TypedValue::Boolean(true));
        assert_eq!(classify("TRUE"), TypedValue::Boolean(true));
        assert_eq!(classify("False"), TypedValue::Boolean(false));
        assert_eq!(classify("F"), TypedValue::Boolean(false));
        assert_eq!(classify("tRuE"), TypedValue::String("tRuE".into()));
        assert_eq!(classify("serverA"), TypedValue::String("serverA".into()));
        assert_eq!(classify("1.2.3"), TypedValue::String("1.2.3".into()));
    }

    #[test]
    fn test_timestamp_shaped_field() {
        assert_eq!(
            classify("2024-01-01 00:00:00"),
            TypedValue::Timestamp(1_704_067_200_000_000_000)
        );

        let err = classifier(ClassifierOptions::default())
            .classify("2024-99-01 00:00:00", false)
            .unwrap_err();
        assert_eq!(err.value, "2024-99-01 00:00:00");
    }

    #[test]
    fn test_non_ascii_digits_stay_strings() {
        let cell = "٢٠٢٤-٠١-٠١ ٠٠:٠٠:٠٠";
        assert_eq!(classify(cell), TypedValue::String(cell.into()));
        assert_eq!(classify("٤٢"), TypedValue::String("٤٢".into()));
        assert_eq!(classify("٤.٥"), TypedValue::String("٤.٥".into()));
    }

    #[test]
    fn test_force_options_priority() {
        let float = classifier(ClassifierOptions {
            force_float: true,
            ..Default::default()
        });
        assert_eq!(float.classify("42", false), Ok(TypedValue::Float(42.0)));

        let string = classifier(ClassifierOptions {
            force_string: true,
            ..Default::default()
        });
        assert_eq!(string.classify("42", false), Ok(TypedValue::String("42".into())));
        assert_eq!(string.classify("93.5", false), Ok(TypedValue::String("93.5".into())));
        // Booleans are not gated by force-string
        assert_eq!(string.classify("true", false), Ok(TypedValue::Boolean(true)));

        let both = classifier(ClassifierOptions {
            force_float: true,
            force_string: true,
            ..Default::default()
        });
        assert_eq!(both.classify("42", false), Ok(TypedValue::String("42".into())));
    }

    #[test]
    fn test_null_token() {
        assert_eq!(classify("null"), TypedValue::String("null".into()));

        let c = classifier(ClassifierOptions {
            treat_null: true,
            ..Default::default()
        });
        assert_eq!(c.classify("null", false), Ok(TypedValue::Null));
        assert_eq!(c.classify("NULL", false), Ok(TypedValue::Null));
        assert_eq!(c.classify("Null", false), Ok(TypedValue::Null));
        assert_eq!(c.classify("nULL", false), Ok(TypedValue::String("nULL".into())));
    }

    #[test]
    fn test_infinite_float_stays_string() {
        assert_eq!(classify("1e999"), TypedValue::String("1e999".into()));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        assert_eq!(
            classify("99999999999999999999"),
            TypedValue::Float(99999999999999999999.0)
        );
    }

    #[test]
    fn test_unix_timestamps_are_nanoseconds() {
        let c = Classifier::new("unix", ClassifierOptions::default()).unwrap();
        // 1704067200 is 2024-01-01 in seconds; it is kept as nanoseconds (1.7s after the epoch)
        assert_eq!(
            c.classify("1704067200", true),
            Ok(TypedValue::Timestamp(1_704_067_200))
        );
        assert!(c.classify("yesterday", true).is_err());

        // Other columns skip the timestamp rules entirely
        assert_eq!(c.classify("1704067200", false), Ok(TypedValue::Integer(1_704_067_200)));
        assert_eq!(
            c.classify("2024-01-01 00:00:00", false),
            Ok(TypedValue::String("2024-01-01 00:00:00".into()))
        );
    }

    #[test]
    fn test_deterministic_and_numeric_roundtrip() {
        let c = classifier(ClassifierOptions::default());
        for cell in ["7", "0", "12345678901", "3.25", "-0.5", "1e-7", "abc"] {
            let first = c.classify(cell, false).unwrap();
            assert_eq!(first, c.classify(cell, false).unwrap());

            match first {
                TypedValue::Integer(v) => {
                    assert_eq!(c.classify(&v.to_string(), false), Ok(TypedValue::Integer(v)))
                }
                TypedValue::Float(v) => {
                    assert_eq!(c.classify(&v.to_string(), false), Ok(TypedValue::Float(v)))
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_into_field_value() {
        assert_eq!(TypedValue::Null.into_field_value(), None);
        assert_eq!(
            TypedValue::Integer(3).into_field_value(),
            Some(FieldValue::Integer(3))
        );
        assert_eq!(
            TypedValue::Timestamp(5).into_field_value(),
            Some(FieldValue::Timestamp(5))
        );
    }
}
