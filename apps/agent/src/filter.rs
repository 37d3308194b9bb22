use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Configuration;
use crate::event::ChangeEvent;

/// Whether an event should reach the monitor.
///
/// The source resource must carry the required annotation with the exact
/// value, and the hostname must not be skipped in the configuration.
pub fn should_forward(configuration: &Configuration, event: &ChangeEvent) -> bool {
    let annotation = &configuration.annotation;
    if !event.has_annotation(&annotation.key, &annotation.value) {
        debug!(
            component = "filter",
            host = %event.hostname,
            source = %event.source,
            reason = "missing annotation",
            "event dropped"
        );
        return false;
    }
    if configuration.is_skipped(&event.hostname) {
        debug!(component = "filter", host = %event.hostname, reason = "skipped", "event dropped");
        return false;
    }
    true
}

pub struct Filter {
    input: Receiver<ChangeEvent>,
    output: Sender<ChangeEvent>,
    configuration: Arc<Configuration>,
}

impl Filter {
    pub fn new(
        input: Receiver<ChangeEvent>,
        output: Sender<ChangeEvent>,
        configuration: Arc<Configuration>,
    ) -> Self {
        Self {
            input,
            output,
            configuration,
        }
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

            if !should_forward(&self.configuration, &event) {
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.output.send(event) => {
                    if result.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(component = "filter", "filter stopped");
    }
}
