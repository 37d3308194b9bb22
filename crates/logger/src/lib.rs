//! Process-wide tracing setup shared by the agent and the monitor.

mod tracing;

pub use self::tracing::init;
