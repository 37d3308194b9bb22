//! Set of running probers, keyed by target.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uptime_wire::ProbeRequest;

use crate::measurement::Observer;
use crate::prober::{ProbeClient, Prober};

/// What [`ProberRegistry::add`] did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No prober existed for the target, one was started
    Added,
    /// A prober with a different request was stopped and a new one started
    Replaced,
    /// An identical request was already running
    Unchanged,
}

struct RunningProber {
    request: ProbeRequest,
    cancel: CancellationToken,
    publishing: Arc<Mutex<()>>,
}

impl RunningProber {
    /// Cancel so that no further measurement reaches the observer
    fn stop(&self) {
        let _publishing = self.publishing.lock();
        self.cancel.cancel();
    }
}

/// Holds at most one prober per target.
///
/// Adding an identical request is a no-op, so re-announcements from the agent
/// do not restart probing. Dropping the registry stops every prober.
pub struct ProberRegistry {
    client: ProbeClient,
    observer: Arc<dyn Observer>,
    probers: Mutex<HashMap<String, RunningProber>>,
}

impl ProberRegistry {
    pub fn new(client: ProbeClient, observer: Arc<dyn Observer>) -> Self {
        Self {
            client,
            observer,
            probers: Mutex::new(HashMap::new()),
        }
    }

    /// Start probing the request's target, replacing a prober whose request differs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add(&self, request: ProbeRequest) -> Upsert {
        let mut probers = self.probers.lock();

        let mut outcome = Upsert::Added;
        if let Some(existing) = probers.get(&request.target) {
            if existing.request == request {
                debug!(%request, "target already registered");
                return Upsert::Unchanged;
            }
            debug!(host = %request.target, "target changed, stopping old prober");
            existing.stop();
            outcome = Upsert::Replaced;
        }

        info!(%request, "target added");
        let cancel = CancellationToken::new();
        let prober = Prober::new(
            request.clone(),
            self.client.clone(),
            self.observer.clone(),
            cancel.clone(),
        );
        let publishing = prober.publishing();
        probers.insert(
            request.target.clone(),
            RunningProber {
                request,
                cancel,
                publishing,
            },
        );
        tokio::spawn(prober.run());

        outcome
    }

    /// Stop probing a target. Returns whether a prober was running.
    ///
    /// The prober is cancelled and its metrics forgotten before the entry is
    /// removed, all under the lock, so a concurrent `add` of the same target
    /// keeps its measurements.
    pub fn remove(&self, target: &str) -> bool {
        let mut probers = self.probers.lock();
        let Some(prober) = probers.get(target) else {
            debug!(host = target, "target not registered");
            return false;
        };

        prober.stop();
        self.observer.forget(target);
        probers.remove(target);
        drop(probers);

        info!(host = target, "target removed");
        true
    }

    pub fn len(&self) -> usize {
        self.probers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.probers.lock().is_empty()
    }

    pub fn contains(&self, target: &str) -> bool {
        self.probers.lock().contains_key(target)
    }

    /// The request currently running for a target
    pub fn request(&self, target: &str) -> Option<ProbeRequest> {
        self.probers.lock().get(target).map(|prober| prober.request.clone())
    }

    /// All registered targets, sorted
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.probers.lock().keys().cloned().collect();
        targets.sort();
        targets
    }
}

impl Drop for ProberRegistry {
    fn drop(&mut self) {
        for prober in self.probers.get_mut().values() {
            prober.cancel.cancel();
        }
    }
}
