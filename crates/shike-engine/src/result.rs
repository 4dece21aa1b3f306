//! Public result and option types for [`crate::parse`].

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::delta::TimeDelta;
use crate::error::ShikeError;

/// What kind of temporal expression was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Point,
    Span,
    Delta,
    Period,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Point => "point",
            Kind::Span => "span",
            Kind::Delta => "delta",
            Kind::Period => "period",
        };
        f.write_str(s)
    }
}

impl FromStr for Kind {
    type Err = ShikeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "point" => Ok(Kind::Point),
            "span" => Ok(Kind::Span),
            "delta" => Ok(Kind::Delta),
            "period" => Ok(Kind::Period),
            other => Err(ShikeError::InvalidExpression(format!(
                "unknown expression kind '{other}'"
            ))),
        }
    }
}

/// How exact the resolved value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Precision {
    #[default]
    #[serde(rename = "accurate")]
    Accurate,
    #[serde(rename = "blur")]
    Blur,
    /// Approximate, leaning towards "at least".
    #[serde(rename = "blur+")]
    BlurPlus,
    /// Approximate, leaning towards "at most".
    #[serde(rename = "blur-")]
    BlurMinus,
}

impl Precision {
    /// Combine the precision of two parts of one expression.
    pub fn merge(self, other: Precision) -> Precision {
        if self == Precision::Accurate {
            other
        } else {
            self
        }
    }
}

/// How boundary date-times are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    /// `YYYY-MM-DD HH:MM:SS`
    #[default]
    String,
    /// Unix seconds in the configured timezone.
    Epoch,
}

/// Options for [`crate::parse`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Force the expression to be read as this kind.
    pub type_hint: Option<Kind>,
    /// Move expressions that depend on the base for their year (or month,
    /// week, day) forward when they would otherwise resolve into the past.
    pub future_leaning: bool,
    pub result_format: ResultFormat,
    /// Number of occurrences to compute for a period with a sub-expression.
    pub occurrence_count: Option<usize>,
    /// Convert lunar dates to solar dates. When false the raw lunar fields
    /// are returned.
    pub resolve_lunar: bool,
    /// Timezone for epoch time bases and epoch results.
    pub timezone: Tz,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            type_hint: None,
            future_leaning: false,
            result_format: ResultFormat::String,
            occurrence_count: None,
            resolve_lunar: true,
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

/// One rendered boundary of a point or span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    NegInf,
    Text(String),
    Epoch(i64),
    PosInf,
}

impl Boundary {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Boundary::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::NegInf => f.write_str("-inf"),
            Boundary::PosInf => f.write_str("inf"),
            Boundary::Text(s) => f.write_str(s),
            Boundary::Epoch(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Boundary::Epoch(n) => serializer.serialize_i64(*n),
            Boundary::Text(s) => serializer.serialize_str(s),
            Boundary::NegInf => serializer.serialize_str("-inf"),
            Boundary::PosInf => serializer.serialize_str("inf"),
        }
    }
}

/// A duration, or a pair of durations for ranges and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeltaValue {
    Single(TimeDelta),
    Range([TimeDelta; 2]),
}

/// The concrete occurrences of a period's sub-expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodPoint {
    pub occurrences: Vec<[Boundary; 2]>,
    pub string: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodValue {
    pub delta: TimeDelta,
    pub point: Option<PeriodPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TimeValue {
    Bounds([Boundary; 2]),
    Delta(DeltaValue),
    Period(PeriodValue),
}

/// The outcome of parsing one temporal expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeResult {
    pub kind: Kind,
    pub precision: Precision,
    pub value: TimeValue,
}

impl TimeResult {
    /// The boundary pair of a point or span.
    pub fn bounds(&self) -> Option<&[Boundary; 2]> {
        match &self.value {
            TimeValue::Bounds(b) => Some(b),
            _ => None,
        }
    }

    /// The boundary pair rendered as strings.
    pub fn bound_strings(&self) -> Option<[String; 2]> {
        let [start, end] = self.bounds()?;
        Some([start.to_string(), end.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_merge() {
        assert_eq!(Precision::Accurate.merge(Precision::Blur), Precision::Blur);
        assert_eq!(Precision::BlurPlus.merge(Precision::Accurate), Precision::BlurPlus);
        assert_eq!(Precision::Accurate.merge(Precision::Accurate), Precision::Accurate);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Point".parse::<Kind>().unwrap(), Kind::Point);
        assert!("instant".parse::<Kind>().is_err());
    }

    #[test]
    fn test_serialize_bounds() {
        let result = TimeResult {
            kind: Kind::Span,
            precision: Precision::BlurMinus,
            value: TimeValue::Bounds([
                Boundary::NegInf,
                Boundary::Text("2021-06-14 23:59:59".to_string()),
            ]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "span");
        assert_eq!(json["precision"], "blur-");
        assert_eq!(json["value"][0], "-inf");
        assert_eq!(json["value"][1], "2021-06-14 23:59:59");
    }

    #[test]
    fn test_serialize_epoch_boundary() {
        let json = serde_json::to_value(Boundary::Epoch(1_623_600_000)).unwrap();
        assert_eq!(json, serde_json::json!(1_623_600_000));
    }
}
