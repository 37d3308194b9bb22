use std::sync::Arc;
use std::time::Instant;

use async_channel::Receiver;
use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uptime_wire::ProbeRequest;

use crate::config::Configuration;
use crate::error::DeliveryError;
use crate::event::{ChangeEvent, EventKind};
use crate::metrics::AgentMetrics;
use crate::retry::MultiplyingWaiter;

/// Number of delivery workers sharing the pipeline's output
pub const SENDER_COUNT: usize = 5;

/// Turns events into calls to the monitor's control endpoint, retrying each
/// call until it succeeds or the worker is cancelled.
#[derive(Clone)]
pub struct DeliveryWorker {
    input: Receiver<ChangeEvent>,
    client: reqwest::Client,
    configuration: Arc<Configuration>,
    metrics: AgentMetrics,
    backoff: MultiplyingWaiter,
}

impl DeliveryWorker {
    pub fn new(
        input: Receiver<ChangeEvent>,
        client: reqwest::Client,
        configuration: Arc<Configuration>,
        metrics: AgentMetrics,
    ) -> Self {
        Self {
            input,
            client,
            configuration,
            metrics,
            backoff: MultiplyingWaiter::default(),
        }
    }

    /// Use a different retry policy
    pub fn with_backoff(mut self, backoff: MultiplyingWaiter) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.input.recv() => match event {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            self.process(&event, &cancel).await;
        }
        debug!(component = "sender", "sender stopped");
    }

    /// The request announcing an event. Deletes only carry the target.
    pub fn request_for(&self, event: &ChangeEvent) -> (Method, ProbeRequest) {
        match event.kind {
            EventKind::Add => (Method::POST, self.configuration.probe_request(&event.hostname)),
            EventKind::Delete => (
                Method::DELETE,
                ProbeRequest {
                    target: event.hostname.clone(),
                    ..ProbeRequest::default()
                },
            ),
        }
    }

    async fn process(&self, event: &ChangeEvent, cancel: &CancellationToken) {
        let (method, request) = self.request_for(event);
        debug!(component = "sender", event = %event.kind, %request, "sending request");

        let mut waiter = self.backoff.clone();
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.send(method.clone(), &request) => result,
            };
            let Err(err) = result else {
                return;
            };

            warn!(
                component = "sender",
                host = %event.hostname,
                error = %err,
                wait = ?waiter.current_wait(),
                "request failed, waiting to retry"
            );
            if waiter.wait(cancel).await.is_err() {
                return;
            }
        }
    }

    async fn send(&self, method: Method, request: &ProbeRequest) -> Result<(), DeliveryError> {
        let mut builder = self.client.request(method, self.configuration.target_url(request));
        if !self.configuration.token.is_empty() {
            builder = builder.bearer_auth(&self.configuration.token);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        self.metrics.observe_request(status.as_u16(), start.elapsed());

        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }
}
