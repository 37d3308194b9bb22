use std::collections::HashMap;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{ChangeEvent, EventKey, EventKind};

/// Re-emit interval of every active add event
pub const RESEND_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Remembers every active add event and periodically sends it again, so a
/// restarted monitor learns its targets back.
pub struct ReAnnouncer {
    input: Receiver<ChangeEvent>,
    output: Sender<ChangeEvent>,
    period: Duration,
    active: HashMap<EventKey, ChangeEvent>,
}

impl ReAnnouncer {
    /// A zero `period` falls back to [`RESEND_INTERVAL`].
    pub fn new(input: Receiver<ChangeEvent>, output: Sender<ChangeEvent>, period: Duration) -> Self {
        Self {
            input,
            output,
            period: if period.is_zero() { RESEND_INTERVAL } else { period },
            active: HashMap::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.input.recv() => match event {
                    Ok(event) => {
                        self.track(&event);
                        vec![event]
                    }
                    Err(_) => break,
                },
                _ = ticker.tick() => {
                    debug!(component = "resender", count = self.active.len(), "re-announcing targets");
                    self.active.values().cloned().collect()
                }
            };

            if !self.forward(batch, &cancel).await {
                break;
            }
        }
        debug!(component = "resender", "resender stopped");
    }

    fn track(&mut self, event: &ChangeEvent) {
        match event.kind {
            EventKind::Add => {
                self.active.insert(event.key(), event.clone());
            }
            EventKind::Delete => {
                self.active.remove(&event.key());
            }
        }
    }

    async fn forward(&self, events: Vec<ChangeEvent>, cancel: &CancellationToken) -> bool {
        for event in events {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                result = self.output.send(event) => {
                    if result.is_err() {
                        return false;
                    }
                }
            }
        }
        true
    }
}
