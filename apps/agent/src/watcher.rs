//! Turns resource callbacks into per-hostname change events.

use std::collections::{BTreeMap, BTreeSet};

use async_channel::Sender;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{ChangeEvent, EventKind};
use crate::metrics::AgentMetrics;

/// What the agent needs to know about an ingress-like resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteResource {
    pub namespace: String,
    pub name: String,
    /// Hostnames as written in the resource's rules
    pub hostnames: Vec<String>,
    pub annotations: BTreeMap<String, String>,
}

impl RouteResource {
    /// `namespace/name`
    pub fn identity(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Normalized, deduplicated and sorted hostnames
    pub fn targets(&self) -> BTreeSet<String> {
        self.hostnames
            .iter()
            .filter(|hostname| !hostname.is_empty())
            .map(|hostname| normalize_hostname(hostname))
            .collect()
    }
}

/// Prefix `https://` unless the hostname already carries a scheme
pub fn normalize_hostname(hostname: &str) -> String {
    if hostname.starts_with("https://") || hostname.starts_with("http://") {
        hostname.to_string()
    } else {
        format!("https://{hostname}")
    }
}

/// Callbacks of a resource watch
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_add(&self, resource: &RouteResource);

    async fn on_update(&self, old: &RouteResource, new: &RouteResource);

    async fn on_delete(&self, resource: &RouteResource);
}

/// Emits one event per hostname into the pipeline.
///
/// Sends block until the next stage takes the event, or the token is cancelled.
#[derive(Clone)]
pub struct IngressWatcher {
    out: Sender<ChangeEvent>,
    metrics: AgentMetrics,
    cancel: CancellationToken,
}

impl IngressWatcher {
    pub fn new(out: Sender<ChangeEvent>, metrics: AgentMetrics, cancel: CancellationToken) -> Self {
        Self { out, metrics, cancel }
    }

    async fn send(&self, kind: EventKind, resource: &RouteResource) {
        let source = resource.identity();
        for hostname in resource.targets() {
            debug!(component = "watcher", %source, host = %hostname, event = %kind, "ingress detected");

            let event = ChangeEvent {
                kind,
                hostname,
                annotations: resource.annotations.clone(),
                source: source.clone(),
            };
            self.metrics.observe_event(&event);

            tokio::select! {
                result = self.out.send(event) => {
                    if result.is_err() {
                        debug!(component = "watcher", "pipeline closed");
                        return;
                    }
                }
                _ = self.cancel.cancelled() => return,
            }
        }
    }
}

#[async_trait]
impl ChangeHandler for IngressWatcher {
    async fn on_add(&self, resource: &RouteResource) {
        self.send(EventKind::Add, resource).await;
    }

    async fn on_update(&self, old: &RouteResource, new: &RouteResource) {
        if old.targets() != new.targets() {
            self.send(EventKind::Delete, old).await;
            self.send(EventKind::Add, new).await;
        }
    }

    async fn on_delete(&self, resource: &RouteResource) {
        self.send(EventKind::Delete, resource).await;
    }
}
