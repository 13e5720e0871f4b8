//! Counter of in-flight long-running handlers
//!
//! Handlers take a `PendingGuard` before their slow work. The guard releases
//! on drop, so the count is decremented on every exit path, panics included.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct PendingWorkTracker {
    count: Arc<AtomicUsize>,
}

impl PendingWorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of in-flight work
    #[must_use = "dropping the guard immediately ends the tracked work"]
    pub fn begin(&self) -> PendingGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        PendingGuard {
            tracker: self.clone(),
        }
    }

    /// Release one unit of work. Never goes below zero.
    pub fn end(&self) {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous.is_err() {
            warn!("Pending work released with nothing in flight, ignoring");
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Scoped registration returned by `PendingWorkTracker::begin`
#[derive(Debug)]
pub struct PendingGuard {
    tracker: PendingWorkTracker,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.tracker.end();
    }
}

#[cfg(test)]
#[path = "tracker_test.rs"]
mod tests;
