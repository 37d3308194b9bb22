use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing at INFO, or DEBUG when `debug` is set.
///
/// `RUST_LOG` still takes precedence over the default directive.
pub fn init(debug: bool) {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    initialize_tracing(level);
}

/// Initialize tracing subscriber with default configuration.
///
/// Output is JSON when `RUST_LOG_FORMAT=json`, compact text otherwise.
fn initialize_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        "" | "compact" => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
        other => {
            let layer = tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed();
            tracing_subscriber::registry().with(layer).init();
            warn!("unknown RUST_LOG_FORMAT {other:?}, falling back to compact output");
            return;
        }
    };

    tracing_subscriber::registry().with(log_layer).init();
}
