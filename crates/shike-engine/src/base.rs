//! Time base normalisation.
//!
//! A time base is the caller's "now". It arrives in one of several shapes
//! and is normalised once per call into a well-formed [`TimeHandler`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{Result, ShikeError};
use crate::handler::{Field, TimeHandler};

const BASE_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The accepted external representations of a time base.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeBaseInput {
    /// Unix seconds, converted to local fields in the configured timezone.
    Timestamp(f64),
    /// A broken-down local date-time.
    DateTime(NaiveDateTime),
    /// Named fields (`year` .. `second`); missing fields are unset.
    Fields(BTreeMap<String, i64>),
    /// Up to six leading fields; missing trailing entries (or `-1`) are unset.
    Sequence(Vec<i64>),
    /// `YYYY-MM-DD HH:MM:SS`
    Text(String),
}

impl TimeBaseInput {
    /// The current wall clock in `tz`.
    pub fn now(tz: Tz) -> Self {
        TimeBaseInput::DateTime(Utc::now().with_timezone(&tz).naive_local())
    }

    /// Interpret a JSON value as a time base.
    ///
    /// Numbers are timestamps, objects are field mappings, arrays are field
    /// sequences and strings use the fixed text format.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(TimeBaseInput::Timestamp)
                .ok_or_else(|| ShikeError::InvalidTimeBase(format!("unusable timestamp {n}"))),
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, v) in map {
                    let n = v.as_i64().ok_or_else(|| {
                        ShikeError::InvalidTimeBase(format!("field '{key}' must be an integer"))
                    })?;
                    fields.insert(key.clone(), n);
                }
                Ok(TimeBaseInput::Fields(fields))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_i64().ok_or_else(|| {
                        ShikeError::InvalidTimeBase(format!("sequence entry {v} is not an integer"))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(TimeBaseInput::Sequence),
            Value::String(s) => Ok(TimeBaseInput::Text(s.clone())),
            other => Err(ShikeError::InvalidTimeBase(format!(
                "unsupported time base shape: {other}"
            ))),
        }
    }
}

impl From<NaiveDateTime> for TimeBaseInput {
    fn from(dt: NaiveDateTime) -> Self {
        TimeBaseInput::DateTime(dt)
    }
}

impl From<&str> for TimeBaseInput {
    fn from(s: &str) -> Self {
        TimeBaseInput::Text(s.to_string())
    }
}

impl From<Vec<i64>> for TimeBaseInput {
    fn from(v: Vec<i64>) -> Self {
        TimeBaseInput::Sequence(v)
    }
}

impl From<i64> for TimeBaseInput {
    fn from(ts: i64) -> Self {
        TimeBaseInput::Timestamp(ts as f64)
    }
}

/// Convert a time base into its canonical six-field form.
///
/// # Errors
///
/// [`ShikeError::InvalidTimeBase`] when the input cannot be read, a field is
/// out of range, or the set fields do not form a prefix.
pub fn normalize_base(input: &TimeBaseInput, tz: Tz) -> Result<TimeHandler> {
    let handler = match input {
        TimeBaseInput::Timestamp(ts) => {
            if !ts.is_finite() {
                return Err(ShikeError::InvalidTimeBase(format!("timestamp {ts}")));
            }
            let secs = ts.floor() as i64;
            let utc = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                ShikeError::InvalidTimeBase(format!("timestamp {ts} is out of range"))
            })?;
            TimeHandler::from_datetime(&utc.with_timezone(&tz).naive_local())
        }
        TimeBaseInput::DateTime(dt) => TimeHandler::from_datetime(dt),
        TimeBaseInput::Fields(map) => {
            let mut h = TimeHandler::unset();
            for (key, value) in map {
                let field = Field::from_name(key).ok_or_else(|| {
                    ShikeError::InvalidTimeBase(format!("unknown field '{key}'"))
                })?;
                h.set(field, to_field_value(field, *value)?);
            }
            h
        }
        TimeBaseInput::Sequence(values) => {
            if values.len() > Field::ALL.len() {
                return Err(ShikeError::InvalidTimeBase(format!(
                    "expected at most 6 fields, got {}",
                    values.len()
                )));
            }
            let mut h = TimeHandler::unset();
            for (field, value) in Field::ALL.into_iter().zip(values) {
                if *value >= 0 {
                    h.set(field, to_field_value(field, *value)?);
                }
            }
            h
        }
        TimeBaseInput::Text(s) => {
            let dt = NaiveDateTime::parse_from_str(s.trim(), BASE_TEXT_FORMAT).map_err(|e| {
                ShikeError::InvalidTimeBase(format!("'{s}' is not YYYY-MM-DD HH:MM:SS: {e}"))
            })?;
            TimeHandler::from_datetime(&dt)
        }
    };

    if !handler.is_well_formed() {
        return Err(ShikeError::InvalidTimeBase(format!(
            "set fields must form a prefix: {}",
            handler.describe()
        )));
    }
    Ok(handler)
}

fn to_field_value(field: Field, value: i64) -> Result<i32> {
    let range = match field {
        Field::Year => 1..=9999,
        Field::Month => 1..=12,
        Field::Day => 1..=31,
        Field::Hour => 0..=23,
        Field::Minute | Field::Second => 0..=59,
    };
    if !range.contains(&value) {
        return Err(ShikeError::InvalidTimeBase(format!(
            "{} {value} is out of range",
            field.name()
        )));
    }
    Ok(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TZ: Tz = chrono_tz::Asia::Shanghai;

    #[test]
    fn test_timestamp_in_timezone() {
        // 2021-06-14 00:00:00 UTC
        let h = normalize_base(&TimeBaseInput::Timestamp(1_623_628_800.0), TZ).unwrap();
        assert_eq!(h, TimeHandler::from_prefix(&[2021, 6, 14, 8, 0, 0]));
    }

    #[test]
    fn test_text_base() {
        let h = normalize_base(&"2021-06-14 10:30:05".into(), TZ).unwrap();
        assert_eq!(h, TimeHandler::from_prefix(&[2021, 6, 14, 10, 30, 5]));
        assert!(matches!(
            normalize_base(&"2021/06/14".into(), TZ),
            Err(ShikeError::InvalidTimeBase(_))
        ));
    }

    #[test]
    fn test_partial_fields() {
        let input = TimeBaseInput::from_json(&json!({"year": 2021})).unwrap();
        let h = normalize_base(&input, TZ).unwrap();
        assert_eq!(h, TimeHandler::from_prefix(&[2021]));
    }

    #[test]
    fn test_fields_with_gap_rejected() {
        let input = TimeBaseInput::from_json(&json!({"year": 2021, "day": 3})).unwrap();
        assert!(matches!(
            normalize_base(&input, TZ),
            Err(ShikeError::InvalidTimeBase(_))
        ));
    }

    #[test]
    fn test_sequence_base() {
        let h = normalize_base(&vec![2021, 6].into(), TZ).unwrap();
        assert_eq!(h, TimeHandler::from_prefix(&[2021, 6]));
        assert!(normalize_base(&vec![2021, 6, 1, 0, 0, 0, 0].into(), TZ).is_err());
        assert!(normalize_base(&vec![-1, 11, 29, -1, 23, -1].into(), TZ).is_err());
    }

    #[test]
    fn test_unknown_key_and_range() {
        let input = TimeBaseInput::from_json(&json!({"yr": 2021})).unwrap();
        assert!(normalize_base(&input, TZ).is_err());
        let input = TimeBaseInput::from_json(&json!({"year": 2021, "month": 13})).unwrap();
        assert!(normalize_base(&input, TZ).is_err());
    }

    #[test]
    fn test_unsupported_json_shape() {
        assert!(matches!(
            TimeBaseInput::from_json(&json!(true)),
            Err(ShikeError::InvalidTimeBase(_))
        ));
        assert!(TimeBaseInput::from_json(&json!(null)).is_err());
        assert!(TimeBaseInput::from_json(&json!(["2021"])).is_err());
    }

    #[test]
    fn test_empty_base_is_allowed() {
        let h = normalize_base(&TimeBaseInput::Sequence(vec![]), TZ).unwrap();
        assert!(h.is_empty());
    }
}
