use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::form_urlencoded;

use crate::{ParseError, duration};

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_CODE: u16 = 200;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A request to start (or stop) checking one target.
///
/// Two requests are equal only if all four fields are equal. The monitor
/// relies on this to ignore a re-announced request for a target it is
/// already checking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRequest {
    pub target: String,
    pub method: String,
    pub valid_codes: BTreeSet<u16>,
    pub interval: Duration,
}

impl ProbeRequest {
    /// Encode the request as a URL query string.
    ///
    /// Fields at their zero value are left out; the decoder fills in defaults.
    pub fn encode(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("target", &self.target);
        if !self.method.is_empty() {
            query.append_pair("method", &self.method);
        }
        if !self.valid_codes.is_empty() {
            let codes: Vec<String> = self.valid_codes.iter().map(u16::to_string).collect();
            query.append_pair("codes", &codes.join(","));
        }
        if !self.interval.is_zero() {
            query.append_pair("interval", &duration::format(self.interval));
        }
        query.finish()
    }

    /// Decode a request from a URL query string (without the leading `?`).
    pub fn decode(query: &str) -> Result<Self, ParseError> {
        let values = parse_query(query)?;
        let get = |key: &str| values.get(key).map(String::as_str).unwrap_or_default();

        let target = get("target");
        if target.is_empty() {
            return Err(ParseError::MissingTarget);
        }

        let method = match get("method") {
            "" => DEFAULT_METHOD,
            method => method,
        };

        let mut valid_codes = BTreeSet::new();
        let codes = get("codes");
        if !codes.is_empty() {
            for code in codes.split(',') {
                let value = code.parse::<u16>().map_err(|source| ParseError::InvalidCode {
                    code: code.to_string(),
                    source,
                })?;
                valid_codes.insert(value);
            }
        }
        if valid_codes.is_empty() {
            valid_codes.insert(DEFAULT_CODE);
        }

        let interval = match get("interval") {
            "" => DEFAULT_INTERVAL,
            raw => duration::parse(raw).map_err(|source| ParseError::InvalidInterval {
                value: raw.to_string(),
                source,
            })?,
        };
        // a zero interval is never encoded, so treat an explicit one as unset
        let interval = if interval.is_zero() { DEFAULT_INTERVAL } else { interval };

        Ok(Self {
            target: target.to_string(),
            method: method.to_string(),
            valid_codes,
            interval,
        })
    }

    pub fn is_valid_code(&self, code: u16) -> bool {
        self.valid_codes.contains(&code)
    }
}

impl FromStr for ProbeRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.valid_codes.iter().map(u16::to_string).collect();
        write!(
            f,
            "{} {} codes=[{}] interval={}",
            self.method,
            self.target,
            codes.join(","),
            duration::format(self.interval)
        )
    }
}

/// Split a query string into its first value per key.
///
/// Rejects `;` separators and broken percent escapes instead of silently
/// passing them through.
fn parse_query(query: &str) -> Result<HashMap<String, String>, ParseError> {
    for segment in query.split('&') {
        if segment.contains(';') {
            return Err(ParseError::MalformedQuery("invalid semicolon separator in query".into()));
        }
        check_escapes(segment)?;
    }

    let mut values = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        values.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    Ok(values)
}

fn check_escapes(segment: &str) -> Result<(), ParseError> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[i..end]);
                return Err(ParseError::MalformedQuery(format!("invalid URL escape {escape:?}")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_escapes_rejects_truncated_and_non_hex_escapes() {
        assert!(check_escapes("target=a%20b").is_ok());
        assert!(check_escapes("target=100%").is_err());
        assert!(check_escapes("target=%2").is_err());
        assert!(check_escapes("target=%zz").is_err());
    }

    #[test]
    fn parse_query_keeps_first_value() {
        let values = parse_query("target=a&target=b").unwrap();
        assert_eq!(values.get("target").map(String::as_str), Some("a"));
    }

    #[test]
    fn display_is_readable() {
        let request = ProbeRequest {
            target: "https://example.com".into(),
            method: "HEAD".into(),
            valid_codes: BTreeSet::from([200, 301]),
            interval: Duration::from_secs(60),
        };
        assert_eq!(request.to_string(), "HEAD https://example.com codes=[200,301] interval=1m0s");
    }
}
