//! The uptime agent.
//!
//! Watches ingress resources and keeps the monitor's set of targets in sync
//! with the hostnames they publish:
//!
//! ```text
//! IngressWatcher → Filter → ReAnnouncer → DeliveryWorker ×5 → POST/DELETE /target
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod kubernetes;
pub mod metrics;
pub mod resender;
pub mod retry;
pub mod sender;
pub mod watcher;

pub use agent::Agent;
pub use config::{Configuration, EndpointPolicy};
pub use error::{AgentError, ConfigError, DeliveryError};
pub use event::{ChangeEvent, EventKind};
pub use watcher::{ChangeHandler, IngressWatcher, RouteResource};
