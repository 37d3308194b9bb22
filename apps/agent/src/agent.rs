use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Configuration;
use crate::error::AgentError;
use crate::event::ChangeEvent;
use crate::filter::Filter;
use crate::metrics::AgentMetrics;
use crate::resender::{RESEND_INTERVAL, ReAnnouncer};
use crate::retry::MultiplyingWaiter;
use crate::sender::{DeliveryWorker, SENDER_COUNT};
use crate::watcher::IngressWatcher;

/// Timeout of each request to the monitor
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// The agent pipeline: watcher → filter → re-announcer → delivery workers.
///
/// Stages are connected by channels holding a single event, so a slow monitor
/// slows the watch down instead of queueing events.
pub struct Agent {
    configuration: Arc<Configuration>,
    metrics: AgentMetrics,
    client: reqwest::Client,
    resend_interval: Duration,
    backoff: MultiplyingWaiter,
    watched: (Sender<ChangeEvent>, Receiver<ChangeEvent>),
}

impl Agent {
    /// Validate the configuration and set up the pipeline
    pub fn new(configuration: Configuration, metrics: AgentMetrics) -> Result<Self, AgentError> {
        configuration.validate()?;
        let client = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;

        Ok(Self {
            configuration: Arc::new(configuration),
            metrics,
            client,
            resend_interval: RESEND_INTERVAL,
            backoff: MultiplyingWaiter::default(),
            watched: async_channel::bounded(1),
        })
    }

    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: MultiplyingWaiter) -> Self {
        self.backoff = backoff;
        self
    }

    /// Handler feeding resource changes into the pipeline
    pub fn watcher(&self, cancel: CancellationToken) -> IngressWatcher {
        IngressWatcher::new(self.watched.0.clone(), self.metrics.clone(), cancel)
    }

    /// Run every stage until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let (filtered_tx, filtered_rx) = async_channel::bounded(1);
        let (outgoing_tx, outgoing_rx) = async_channel::bounded(1);

        let filter = Filter::new(self.watched.1, filtered_tx, self.configuration.clone());
        let resender = ReAnnouncer::new(filtered_rx, outgoing_tx, self.resend_interval);
        let worker = DeliveryWorker::new(
            outgoing_rx,
            self.client,
            self.configuration.clone(),
            self.metrics,
        )
        .with_backoff(self.backoff);

        let mut tasks = vec![
            tokio::spawn(filter.run(cancel.clone())),
            tokio::spawn(resender.run(cancel.clone())),
        ];
        for _ in 0..SENDER_COUNT {
            tasks.push(tokio::spawn(worker.clone().run(cancel.clone())));
        }

        info!(configuration = %self.configuration, "uptime agent running");
        join_all(tasks).await;
        info!("uptime agent stopped");
    }
}
