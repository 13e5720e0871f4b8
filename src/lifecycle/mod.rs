//! Process lifecycle: status flags, pending work and graceful drain
//!
//! - `LifecycleState` - ready/started/healthy flags and the drain phase
//! - `PendingWorkTracker` - counter of in-flight long-running handlers
//! - `DrainController` - RUNNING -> DRAINING -> STOPPED on termination

mod drain;
mod tracker;

pub use drain::{DrainConfig, DrainController, DrainOutcome};
pub use tracker::{PendingGuard, PendingWorkTracker};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

/// Drain state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrainPhase {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

impl DrainPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DrainPhase::Running,
            1 => DrainPhase::Draining,
            _ => DrainPhase::Stopped,
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    ready: AtomicBool,
    started: AtomicBool,
    healthy: AtomicBool,
    phase: AtomicU8,
}

/// Shared process status, passed to every handler
///
/// All flags start false and the phase starts `Running`. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct LifecycleState {
    flags: Arc<Flags>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.flags.ready.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.flags.started.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.flags.healthy.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> DrainPhase {
        DrainPhase::from_u8(self.flags.phase.load(Ordering::SeqCst))
    }

    pub fn is_draining(&self) -> bool {
        self.phase() != DrainPhase::Running
    }

    /// Mark the instance ready to receive traffic.
    ///
    /// Refused once draining has begun. Returns whether the flag is now set.
    pub fn mark_ready(&self) -> bool {
        if self.is_draining() {
            return false;
        }
        self.flags.ready.store(true, Ordering::SeqCst);
        // A drain may have started between the check and the store
        if self.is_draining() {
            self.flags.ready.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub fn mark_started(&self) {
        self.flags.started.store(true, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.flags.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Running -> Draining. Clears `ready`. Only the first caller gets `true`.
    pub fn begin_draining(&self) -> bool {
        let won = self
            .flags
            .phase
            .compare_exchange(
                DrainPhase::Running as u8,
                DrainPhase::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if won {
            self.flags.ready.store(false, Ordering::SeqCst);
            info!("Lifecycle phase: RUNNING -> DRAINING, no longer ready");
        }
        won
    }

    /// Draining -> Stopped. Clears every flag. Only the first caller gets `true`.
    pub fn finish_stopping(&self) -> bool {
        let won = self
            .flags
            .phase
            .compare_exchange(
                DrainPhase::Draining as u8,
                DrainPhase::Stopped as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if won {
            self.flags.ready.store(false, Ordering::SeqCst);
            self.flags.started.store(false, Ordering::SeqCst);
            self.flags.healthy.store(false, Ordering::SeqCst);
            info!("Lifecycle phase: DRAINING -> STOPPED");
        }
        won
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
