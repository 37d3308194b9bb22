#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uptime_agent::metrics::{AgentMetrics, metrics_route};
use uptime_agent::{Agent, Configuration, kubernetes};

/// Keep the uptime monitor's targets in sync with the cluster's ingresses
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Monitor URL, overrides the configuration file
    #[arg(long)]
    monitor: Option<String>,

    /// Monitor token, overrides the configuration file
    #[arg(long, env = "UPTIME_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Listen address of the metrics endpoint
    #[arg(long, default_value = "0.0.0.0:9090")]
    prom: SocketAddr,

    /// Configuration file
    #[arg(long)]
    configuration: Option<PathBuf>,

    /// Only watch ingresses in this namespace
    #[arg(long)]
    namespace: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.debug);

    let mut configuration = match &args.configuration {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(monitor) = args.monitor {
        configuration.monitor = monitor;
    }
    if let Some(token) = args.token {
        configuration.token = token;
    }

    let registry = prometheus::Registry::new();
    let metrics = AgentMetrics::new()?;
    metrics.register(&registry)?;

    let agent = Agent::new(configuration, metrics).context("failed to start agent")?;
    let client = kube::Client::try_default()
        .await
        .context("failed to connect to cluster")?;

    let registry = web::Data::new(registry);
    let server = HttpServer::new(move || App::new().app_data(registry.clone()).service(metrics_route))
        .bind(args.prom)?
        .disable_signals()
        .run();
    let server_handle = server.handle();
    actix_web::rt::spawn(server);

    let cancel = CancellationToken::new();
    let watcher = agent.watcher(cancel.clone());
    actix_web::rt::spawn(shutdown_on_signal(cancel.clone()));

    info!(version = env!("CARGO_PKG_VERSION"), "starting uptime agent");
    tokio::join!(
        agent.run(cancel.clone()),
        kubernetes::watch_ingresses(client, args.namespace.as_deref(), &watcher, cancel.clone()),
    );

    server_handle.stop(true).await;
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    info!("shutting down");
    cancel.cancel();
}
