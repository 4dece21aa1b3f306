//! # shike-engine
//!
//! Deterministic parsing of Chinese temporal expressions.
//!
//! A short fragment such as `去年中秋节前后`, `9:00至18:00` or
//! `每周五下午4点` is resolved against a caller-supplied time base into a
//! calendar-correct point, span, duration or recurrence.
//!
//! ## Modules
//!
//! - [`base`] — time base shapes and their normalisation
//! - [`handler`] — the six-field time handler, completion and bounds
//! - [`lunar`] — lunar-solar conversion and the 24 solar terms
//! - [`delta`] — duration grammar and duration arithmetic
//! - [`result`] — result, precision and option types
//! - [`numeral`] — Arabic and Chinese numerals
//! - [`error`] — error types
//!
//! The pattern cascade, the recurrence parser and the resolver are internal;
//! [`parse`] and [`TimeParser`] are the entry points.
//!
//! ```
//! use shike_engine::{parse, Kind, ParseOptions, TimeBaseInput};
//!
//! let base = TimeBaseInput::Sequence(vec![2021]);
//! let result = parse("3年后", &base, &ParseOptions::default()).unwrap();
//! assert_eq!(result.kind, Kind::Span);
//! assert_eq!(
//!     result.bound_strings().unwrap(),
//!     ["2024-01-01 00:00:00".to_string(), "2024-12-31 23:59:59".to_string()]
//! );
//! ```

pub mod base;
mod cascade;
pub mod delta;
pub mod error;
pub mod handler;
pub mod lunar;
pub mod numeral;
mod period;
mod resolver;
pub mod result;

pub use base::{normalize_base, TimeBaseInput};
pub use delta::{parse_delta, parse_delta_forced, DeltaUnit, ParsedDelta, TimeDelta};
pub use error::{Result, ShikeError};
pub use handler::{Bound, Field, TimeHandler};
pub use lunar::{lunar_to_solar, solar_term_date, solar_to_lunar, LunarDate};
pub use resolver::{parse, TimeParser, DATETIME_FORMAT};
pub use result::{
    Boundary, DeltaValue, Kind, ParseOptions, PeriodPoint, PeriodValue, Precision, ResultFormat,
    TimeResult, TimeValue,
};
