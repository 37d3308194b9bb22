use std::io::Error as IoError;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors found while loading or validating the agent configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read { path: PathBuf, source: IoError },
    #[error("parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing monitor URL")]
    MissingMonitor,
    #[error("invalid monitor URL {url:?}: {source}")]
    InvalidMonitor { url: String, source: url::ParseError },
}

/// A single failed call to the monitor's control endpoint
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected http status: {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
