//! Multiplying backoff between delivery attempts.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait cancelled")]
pub struct Cancelled;

/// Waits that grow by `factor` after every attempt, capped at `max_wait`.
#[derive(Debug, Clone)]
pub struct MultiplyingWaiter {
    initial_wait: Duration,
    max_wait: Duration,
    factor: u32,
    current: Duration,
}

impl MultiplyingWaiter {
    pub fn new(initial_wait: Duration, max_wait: Duration, factor: u32) -> Self {
        Self {
            initial_wait,
            max_wait,
            factor,
            current: initial_wait.min(max_wait),
        }
    }

    /// The wait the next call to [`next_wait`](Self::next_wait) returns
    pub fn current_wait(&self) -> Duration {
        self.current
    }

    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current;
        self.current = wait
            .checked_mul(self.factor)
            .unwrap_or(self.max_wait)
            .min(self.max_wait);
        wait
    }

    /// Sleep for the next wait, returning early if the token is cancelled
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let wait = self.next_wait();
        tokio::select! {
            _ = cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial_wait.min(self.max_wait);
    }
}

impl Default for MultiplyingWaiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 2)
    }
}
