use std::num::ParseIntError;

use thiserror::Error;

/// Errors returned when decoding a [`ProbeRequest`](crate::ProbeRequest).
///
/// The `Display` text is what the monitor returns as the body of a 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parse query: {0}")]
    MalformedQuery(String),
    #[error("missing mandatory target")]
    MissingTarget,
    #[error("invalid code {code}: {source}")]
    InvalidCode { code: String, source: ParseIntError },
    #[error("invalid interval {value}: {source}")]
    InvalidInterval { value: String, source: DurationError },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("negative duration {0:?}")]
    Negative(String),
    #[error("duration {0:?} overflows")]
    Overflow(String),
}
