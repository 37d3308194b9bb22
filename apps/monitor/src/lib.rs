//! The uptime monitor.
//!
//! Runs one [`Prober`](prober::Prober) per registered target and publishes
//! every measurement as Prometheus metrics. Targets are registered and
//! unregistered over the token-protected control endpoint `/target`.

pub mod auth;
pub mod error;
pub mod measurement;
pub mod metrics;
pub mod prober;
pub mod registry;
pub mod routes;
pub mod server;
pub mod tls;

pub use error::AppError;
pub use registry::{ProberRegistry, Upsert};
