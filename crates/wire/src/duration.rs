//! Duration strings in the form the monitor has always spoken: `5m0s`,
//! `1h30m0s`, `1.5s`, `250ms`.
//!
//! [`format`] produces the canonical form and [`parse`] accepts any sequence
//! of decimal numbers with an optional fraction and a unit suffix (`ns`, `us`,
//! `µs`, `ms`, `s`, `m`, `h`), e.g. `5m`, `1h30m` or `0.5s`.

use std::fmt::Write;
use std::time::Duration;

use crate::DurationError;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

// digits of a fraction beyond this are below nanosecond resolution for every unit
const MAX_FRACTION_DIGITS: usize = 18;

/// Format a duration in its canonical string form.
pub fn format(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SEC {
        let (unit, scale, digits) = if nanos < NANOS_PER_MICRO {
            ("ns", 1, 0)
        } else if nanos < NANOS_PER_MILLI {
            ("µs", NANOS_PER_MICRO, 3)
        } else {
            ("ms", NANOS_PER_MILLI, 6)
        };
        return format!("{}{}{}", nanos / scale, fraction(nanos % scale, digits), unit);
    }

    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{seconds}{}s", fraction(u128::from(duration.subsec_nanos()), 9));
    out
}

fn fraction(value: u128, digits: usize) -> String {
    if value == 0 {
        return String::new();
    }
    let padded = format!("{value:0digits$}");
    format!(".{}", padded.trim_end_matches('0'))
}

/// Parse a duration string.
pub fn parse(input: &str) -> Result<Duration, DurationError> {
    let mut s = input;
    if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    } else if s.starts_with('-') {
        return Err(DurationError::Negative(input.to_string()));
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let overflow = || DurationError::Overflow(input.to_string());
    let mut total: u128 = 0;

    while !s.is_empty() {
        let (whole, rest) = split_digits(s);
        s = rest;

        let mut frac = "";
        if let Some(rest) = s.strip_prefix('.') {
            let (digits, rest) = split_digits(rest);
            frac = digits;
            s = rest;
        }
        if whole.is_empty() && frac.is_empty() {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let unit_len = s.find(|c: char| c == '.' || c.is_ascii_digit()).unwrap_or(s.len());
        let (unit, rest) = s.split_at(unit_len);
        s = rest;

        let scale = match unit {
            "" => return Err(DurationError::MissingUnit(input.to_string())),
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => NANOS_PER_MIN,
            "h" => NANOS_PER_HOUR,
            other => {
                return Err(DurationError::UnknownUnit {
                    unit: other.to_string(),
                    input: input.to_string(),
                });
            }
        };

        if !whole.is_empty() {
            let value: u128 = whole.parse().map_err(|_| overflow())?;
            let nanos = value.checked_mul(scale).ok_or_else(overflow)?;
            total = total.checked_add(nanos).ok_or_else(overflow)?;
        }
        if !frac.is_empty() {
            let frac = &frac[..frac.len().min(MAX_FRACTION_DIGITS)];
            let value: u128 = frac.parse().map_err(|_| overflow())?;
            let divisor = 10u128.pow(frac.len() as u32);
            total = total.checked_add(value * scale / divisor).ok_or_else(overflow)?;
        }
    }

    let nanos = u64::try_from(total).map_err(|_| overflow())?;
    Ok(Duration::from_nanos(nanos))
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Serde adapter storing a [`Duration`] as its string form.
///
/// ```ignore
/// #[serde(with = "uptime_wire::duration::as_string")]
/// interval: Duration,
/// ```
pub mod as_string {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(D::Error::custom)
    }
}
