//! Agent configuration, loaded from a TOML file.
//!
//! ```toml
//! monitor = "http://uptime-monitor:8080"
//! token = "secret"
//!
//! [global]
//! interval = "5m"
//! method = "GET"
//! valid-status-codes = [200]
//!
//! [hosts."https://internal.example.com"]
//! skip = true
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use std::{fmt, fs};

use serde::Deserialize;
use uptime_wire::{DEFAULT_CODE, DEFAULT_INTERVAL, DEFAULT_METHOD, ProbeRequest, TARGET_PATH, duration};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_ANNOTATION_KEY: &str = "traefik.ingress.kubernetes.io/router.entrypoints";
pub const DEFAULT_ANNOTATION_VALUE: &str = "websecure";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Base URL of the monitor's control server
    pub monitor: String,

    /// Bearer token sent to the monitor, omitted when empty
    pub token: String,

    /// Annotation a resource must carry to be monitored
    pub annotation: RequiredAnnotation,

    pub global: EndpointPolicy,

    /// Per-host overrides, keyed by `https://host` or the bare hostname
    pub hosts: HashMap<String, EndpointPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequiredAnnotation {
    pub key: String,
    pub value: String,
}

/// How one host is checked. Zero-valued fields are unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EndpointPolicy {
    pub skip: bool,
    #[serde(deserialize_with = "duration::as_string::deserialize")]
    pub interval: Duration,
    pub method: String,
    pub valid_status_codes: Vec<u16>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            monitor: String::new(),
            token: String::new(),
            annotation: RequiredAnnotation::default(),
            global: EndpointPolicy::defaults(),
            hosts: HashMap::new(),
        }
    }
}

impl Default for RequiredAnnotation {
    fn default() -> Self {
        Self {
            key: DEFAULT_ANNOTATION_KEY.to_string(),
            value: DEFAULT_ANNOTATION_VALUE.to_string(),
        }
    }
}

impl EndpointPolicy {
    /// The policy used for hosts without any configuration
    pub fn defaults() -> Self {
        Self {
            skip: false,
            interval: DEFAULT_INTERVAL,
            method: DEFAULT_METHOD.to_string(),
            valid_status_codes: vec![DEFAULT_CODE],
        }
    }

    /// Copy of `self` with every field set in `custom` taking precedence
    pub fn overlay(&self, custom: &EndpointPolicy) -> EndpointPolicy {
        let mut policy = self.clone();
        policy.skip |= custom.skip;
        if !custom.interval.is_zero() {
            policy.interval = custom.interval;
        }
        if !custom.method.is_empty() {
            policy.method.clone_from(&custom.method);
        }
        if !custom.valid_status_codes.is_empty() {
            policy.valid_status_codes.clone_from(&custom.valid_status_codes);
        }
        policy
    }
}

impl Configuration {
    /// Parse a configuration document. Fields missing from `[global]` keep their defaults.
    pub fn load(content: &str) -> Result<Self, ConfigError> {
        let mut configuration: Self = toml::from_str(content)?;
        configuration.global = EndpointPolicy::defaults().overlay(&configuration.global);
        Ok(configuration)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&content)
    }

    /// Check the fields the agent cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.is_empty() {
            return Err(ConfigError::MissingMonitor);
        }
        Url::parse(&self.monitor).map_err(|source| ConfigError::InvalidMonitor {
            url: self.monitor.clone(),
            source,
        })?;
        Ok(())
    }

    /// Per-host override for a hostname, with or without its scheme
    pub fn endpoint(&self, hostname: &str) -> Option<&EndpointPolicy> {
        self.hosts.get(hostname).or_else(|| {
            let bare = hostname
                .strip_prefix("https://")
                .or_else(|| hostname.strip_prefix("http://"))?;
            self.hosts.get(bare)
        })
    }

    pub fn is_skipped(&self, hostname: &str) -> bool {
        self.endpoint(hostname).is_some_and(|policy| policy.skip)
    }

    /// The global policy overlaid with the host's overrides
    pub fn policy(&self, hostname: &str) -> EndpointPolicy {
        match self.endpoint(hostname) {
            Some(custom) => self.global.overlay(custom),
            None => self.global.clone(),
        }
    }

    pub fn probe_request(&self, hostname: &str) -> ProbeRequest {
        let policy = self.policy(hostname);
        ProbeRequest {
            target: hostname.to_string(),
            method: policy.method,
            valid_codes: policy.valid_status_codes.into_iter().collect(),
            interval: policy.interval,
        }
    }

    /// URL of the control endpoint carrying the encoded request
    pub fn target_url(&self, request: &ProbeRequest) -> String {
        format!(
            "{}{}?{}",
            self.monitor.trim_end_matches('/'),
            TARGET_PATH,
            request.encode()
        )
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "none" } else { "set" };
        write!(
            f,
            "monitor={} token={} annotation={}={} interval={} method={} codes={:?} hosts={}",
            self.monitor,
            token,
            self.annotation.key,
            self.annotation.value,
            duration::format(self.global.interval),
            self.global.method,
            self.global.valid_status_codes,
            self.hosts.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_only_replaces_set_fields() {
        let global = EndpointPolicy::defaults();
        let custom = EndpointPolicy {
            method: "HEAD".into(),
            ..EndpointPolicy::default()
        };

        let policy = global.overlay(&custom);
        assert_eq!(policy.method, "HEAD");
        assert_eq!(policy.interval, DEFAULT_INTERVAL);
        assert_eq!(policy.valid_status_codes, vec![200]);
        assert!(!policy.skip);
    }

    #[test]
    fn test_endpoint_lookup_accepts_bare_hostname() {
        let mut configuration = Configuration::default();
        configuration.hosts.insert(
            "internal.example.com".into(),
            EndpointPolicy {
                skip: true,
                ..EndpointPolicy::default()
            },
        );

        assert!(configuration.is_skipped("https://internal.example.com"));
        assert!(configuration.is_skipped("internal.example.com"));
        assert!(!configuration.is_skipped("https://example.com"));
    }

    #[test]
    fn test_target_url() {
        let configuration = Configuration {
            monitor: "http://monitor:8080/".into(),
            ..Configuration::default()
        };
        let request = configuration.probe_request("https://example.com");
        assert_eq!(
            configuration.target_url(&request),
            "http://monitor:8080/target?target=https%3A%2F%2Fexample.com&method=GET&codes=200&interval=5m0s"
        );
    }
}
