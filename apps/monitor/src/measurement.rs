use std::time::Duration;

use chrono::TimeDelta;

/// Outcome of one probe against one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Target as it was registered, used as the metrics label
    pub host: String,

    /// Whether the status code was one of the request's valid codes
    pub up: bool,

    /// HTTP status code, 0 when no response was received
    pub status_code: u16,

    /// Time until the response headers were received
    pub latency: Duration,

    /// Whether the response came over TLS with at least one peer certificate
    pub is_tls: bool,

    /// Time until the furthest certificate expiry, negative once expired
    pub cert_expiry: TimeDelta,
}

impl Measurement {
    /// Create a measurement for a target that did not answer
    pub fn new(host: String) -> Self {
        Self {
            host,
            up: false,
            status_code: 0,
            latency: Duration::ZERO,
            is_tls: false,
            cert_expiry: TimeDelta::zero(),
        }
    }

    /// Record the response to the probe
    pub fn response(mut self, status_code: u16, latency: Duration, up: bool) -> Self {
        self.status_code = status_code;
        self.latency = latency;
        self.up = up;
        self
    }

    /// Record that the response arrived over TLS
    pub fn tls(mut self, cert_expiry: TimeDelta) -> Self {
        self.is_tls = true;
        self.cert_expiry = cert_expiry;
        self
    }
}

/// Receives every measurement a prober publishes.
///
/// `forget` is called once a target is unregistered so per-host state can be
/// dropped.
pub trait Observer: Send + Sync {
    fn observe(&self, measurement: &Measurement);

    fn forget(&self, _host: &str) {}
}
