//! Graceful drain on termination
//!
//! ```text
//! RUNNING --request_drain--> DRAINING --pending == 0 or timeout--> STOPPED
//! ```
//!
//! Entering DRAINING clears `ready` so the readiness view fails and new work
//! is rejected. While draining, the pending work counter is polled on a fixed
//! interval until it reaches zero or the drain timeout elapses. Teardown then
//! closes every dependency handle exactly once. Repeated termination requests
//! neither restart the timer nor repeat teardown.

use super::{DrainPhase, LifecycleState, PendingWorkTracker};
use crate::deps::Dependencies;
use crate::server::{shutdown_channel, ShutdownController, ShutdownSignal};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default bound on the drain period
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between pending work checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Floor for the poll interval; a zero interval would busy-loop
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl DrainConfig {
    /// Same config with the poll interval raised to `MIN_POLL_INTERVAL`
    pub fn normalized(self) -> Self {
        Self {
            timeout: self.timeout,
            poll_interval: self.poll_interval.max(MIN_POLL_INTERVAL),
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DRAIN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How the drain period ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All pending work finished before the timeout
    Completed { waited: Duration },
    /// The timeout elapsed with work still in flight
    Forced { pending: usize, waited: Duration },
}

impl DrainOutcome {
    pub fn is_forced(&self) -> bool {
        matches!(self, DrainOutcome::Forced { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrainOutcome::Completed { .. } => "completed",
            DrainOutcome::Forced { .. } => "forced",
        }
    }
}

pub struct DrainController {
    lifecycle: LifecycleState,
    tracker: PendingWorkTracker,
    config: DrainConfig,
    trigger: ShutdownController,
    requested: ShutdownSignal,
    draining_since: OnceLock<Instant>,
}

impl DrainController {
    pub fn new(lifecycle: LifecycleState, tracker: PendingWorkTracker, config: DrainConfig) -> Self {
        let (trigger, requested) = shutdown_channel();
        Self {
            lifecycle,
            tracker,
            config: config.normalized(),
            trigger,
            requested,
            draining_since: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> DrainPhase {
        self.lifecycle.phase()
    }

    /// Ask the process to drain. Idempotent.
    ///
    /// Returns `true` only for the request that moved RUNNING -> DRAINING.
    pub fn request_drain(&self, source: &str) -> bool {
        if !self.lifecycle.begin_draining() {
            info!(
                source,
                phase = ?self.phase(),
                "Termination requested while already shutting down, ignoring"
            );
            return false;
        }

        let _ = self.draining_since.set(Instant::now());
        info!(
            source,
            pending = self.tracker.current(),
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Termination requested, draining in-flight work"
        );
        self.trigger.shutdown();
        true
    }

    /// Wait until a drain has been requested
    pub async fn wait_for_request(&self) {
        self.requested.clone().wait().await;
    }

    /// Wait for a drain request, then wait for pending work to reach zero or
    /// for the drain timeout to elapse, whichever comes first.
    pub async fn drain(&self) -> DrainOutcome {
        self.wait_for_request().await;

        let since = *self.draining_since.get_or_init(Instant::now);
        let deadline = since + self.config.timeout;

        loop {
            let pending = self.tracker.current();
            let now = Instant::now();
            let waited = now.saturating_duration_since(since);

            if pending == 0 {
                info!(waited_ms = waited.as_millis() as u64, "Drain complete, no pending work");
                return DrainOutcome::Completed { waited };
            }

            if now >= deadline {
                warn!(
                    pending,
                    waited_ms = waited.as_millis() as u64,
                    "Drain timeout elapsed, forcing shutdown with {} tasks still pending",
                    pending
                );
                return DrainOutcome::Forced { pending, waited };
            }

            debug!(pending, "Waiting for in-flight work to finish");
            let remaining = deadline - now;
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }

    /// Drain, then close every dependency handle.
    ///
    /// Returns `None` if another caller already performed the teardown.
    pub async fn run(&self, dependencies: &Dependencies) -> Option<DrainOutcome> {
        let outcome = self.drain().await;

        if !self.lifecycle.finish_stopping() {
            debug!("Teardown already performed");
            return None;
        }

        info!(outcome = outcome.as_str(), "Releasing dependency handles");
        dependencies.close_all().await;
        Some(outcome)
    }
}

#[cfg(test)]
#[path = "drain_test.rs"]
mod tests;
