//! HTTP server for health, metrics and application endpoints
//!
//! Provides dependency probes:
//! - `/health` - Per-service status of every backing service
//! - `/liveness` - Is the process functioning at all?
//! - `/readiness` - Should traffic be routed to this instance right now?
//! - `/startup` - Were all backing service handles established?
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod error;
mod health;
mod metrics;
mod routes;
pub mod shutdown;

pub use error::ApiError;
pub use health::{HealthAggregator, HealthReport, Verdict};
pub use metrics::{create_metrics, ServiceMetrics, SharedMetrics};
pub use routes::{build_router, serve, AppState, MessageResponse};
pub use shutdown::{
    shutdown_channel, ShutdownController, ShutdownSignal, SignalListener, TerminationSource,
};

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
