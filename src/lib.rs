//! Vigil: dependency health probes and graceful drain for an HTTP service
//!
//! - `config` - Environment configuration
//! - `deps` - Backing service handles, probes and bootstrap
//! - `lifecycle` - Process flags, pending work tracking and the drain state machine
//! - `server` - HTTP routes, health views, metrics and signal handling
//! - `app` - Wires everything together for the binary

pub mod app;
pub mod config;
pub mod deps;
pub mod lifecycle;
pub mod server;
