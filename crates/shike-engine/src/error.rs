//! Error types for shike-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShikeError {
    #[error("Invalid time base: {0}")]
    InvalidTimeBase(String),

    #[error("Invalid lunar date: {0}")]
    InvalidLunarDate(String),

    #[error("Unresolvable day: {0}")]
    UnresolvableDay(String),

    #[error("Ambiguous expression: {0}")]
    AmbiguousExpression(String),

    #[error("Incomplete time base: {0}")]
    IncompleteTimeBase(String),

    #[error("Invalid calendar date: {0}")]
    InvalidCalendarDate(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
}

pub type Result<T> = std::result::Result<T, ShikeError>;
