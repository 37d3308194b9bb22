#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use uptime_monitor::auth::AuthToken;
use uptime_monitor::server::{MonitorState, control_server, metrics_server};

/// Probe registered targets and export the results as Prometheus metrics
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Bearer token the agent must present on the control endpoint
    #[arg(long, env = "UPTIME_TOKEN", hide_env_values = true)]
    token: String,

    /// Listen address of the control endpoint
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Listen address of the metrics endpoint
    #[arg(long, default_value = "0.0.0.0:9090")]
    prom: SocketAddr,

    /// Timeout of each probe request
    #[arg(long, default_value = "10s", value_parser = uptime_wire::duration::parse)]
    timeout: Duration,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.debug);

    let state = MonitorState::new(args.timeout)?;
    let (control, addr) = control_server(args.addr, state.probers.clone(), AuthToken::new(args.token))?;
    let metrics = metrics_server(args.prom, state.metrics.clone())?;

    info!(%addr, prom = %args.prom, version = env!("CARGO_PKG_VERSION"), "uptime monitor started");
    tokio::try_join!(control, metrics)?;
    info!("uptime monitor stopped");

    Ok(())
}
