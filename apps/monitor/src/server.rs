//! Wiring of the control and metrics HTTP servers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};

use crate::auth::AuthToken;
use crate::error::AppError;
use crate::metrics::HostMetrics;
use crate::prober::ProbeClient;
use crate::registry::ProberRegistry;
use crate::routes;

/// Registry and metrics shared by both servers
pub struct MonitorState {
    pub probers: web::Data<ProberRegistry>,
    pub metrics: prometheus::Registry,
}

impl MonitorState {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let metrics = prometheus::Registry::new();
        let host_metrics = HostMetrics::new()?;
        host_metrics.register(&metrics)?;

        let client = ProbeClient::new(timeout)?;
        let probers = web::Data::new(ProberRegistry::new(client, Arc::new(host_metrics)));

        Ok(Self { probers, metrics })
    }
}

/// Bind the control server. Returns the server and the bound address.
pub fn control_server(
    addr: SocketAddr,
    probers: web::Data<ProberRegistry>,
    token: AuthToken,
) -> Result<(Server, SocketAddr), AppError> {
    let token = web::Data::new(token);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(probers.clone())
            .app_data(token.clone())
            .configure(routes::routes)
    })
    .bind(addr)?;

    let bound = server.addrs().first().copied().unwrap_or(addr);
    Ok((server.run(), bound))
}

/// Bind the server exposing `/metrics`
pub fn metrics_server(addr: SocketAddr, registry: prometheus::Registry) -> Result<Server, AppError> {
    let registry = web::Data::new(registry);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .configure(routes::metrics_routes)
    })
    .bind(addr)?
    .run();

    Ok(server)
}
