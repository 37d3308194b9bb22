//! Prometheus metrics of the agent pipeline.

use std::time::Duration;

use actix_web::{HttpResponse, get, web};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::event::ChangeEvent;

const NAMESPACE: &str = "uptime";
const SUBSYSTEM: &str = "agent";

#[derive(Clone)]
pub struct AgentMetrics {
    ingress_events: IntCounterVec,
    requests: IntCounterVec,
    request_latency: HistogramVec,
}

impl AgentMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let ingress_events = IntCounterVec::new(
            Opts::new("ingress_events", "Number of ingress events received from the cluster")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &["host", "type"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("requests", "Number of requests sent to the monitor")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &["code"],
        )?;
        let request_latency = HistogramVec::new(
            HistogramOpts::new("request_latency", "Latency of requests sent to the monitor, in seconds")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM)
                .buckets(vec![0.01, 0.1, 0.2, 0.5, 1.0, 2.0]),
            &["code"],
        )?;

        Ok(Self {
            ingress_events,
            requests,
            request_latency,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.ingress_events.clone()))?;
        registry.register(Box::new(self.requests.clone()))?;
        registry.register(Box::new(self.request_latency.clone()))?;
        Ok(())
    }

    pub fn observe_event(&self, event: &ChangeEvent) {
        let kind = event.kind.to_string();
        self.ingress_events
            .with_label_values(&[event.hostname.as_str(), kind.as_str()])
            .inc();
    }

    /// Record a request to the monitor that got a response
    pub fn observe_request(&self, code: u16, latency: Duration) {
        let code = code.to_string();
        self.requests.with_label_values(&[code.as_str()]).inc();
        self.request_latency
            .with_label_values(&[code.as_str()])
            .observe(latency.as_secs_f64());
    }

    pub fn events(&self, host: &str, kind: &str) -> u64 {
        self.ingress_events.with_label_values(&[host, kind]).get()
    }

    pub fn requests(&self, code: u16) -> u64 {
        self.requests.with_label_values(&[code.to_string().as_str()]).get()
    }
}

#[get("/metrics")]
pub async fn metrics_route(registry: web::Data<Registry>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(error = %err, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok().content_type(encoder.format_type()).body(buffer)
}
