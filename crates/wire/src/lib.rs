//! Wire contract between the uptime agent and the uptime monitor.
//!
//! The agent registers and unregisters checks by calling `/target` on the
//! monitor with a [`ProbeRequest`] encoded as a URL query string:
//!
//! ```text
//! POST   /target?target=https://example.com&method=GET&codes=200&interval=5m0s
//! DELETE /target?target=https://example.com
//! ```

pub mod duration;
mod error;
mod request;

pub use error::{DurationError, ParseError};
pub use request::{DEFAULT_CODE, DEFAULT_INTERVAL, DEFAULT_METHOD, ProbeRequest};

/// Path of the monitor's control endpoint.
pub const TARGET_PATH: &str = "/target";
