//! Termination signals and shutdown notification
//!
//! SIGTERM and SIGINT are merged into one stream of termination requests, so
//! both signals go through the same drain routine. A watch channel carries
//! the one-way "shutdown has begun" notification to listeners such as the
//! HTTP server.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Shutdown notification receiver
///
/// Cloned and passed to components that need to wait for shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender dropped, treat as shutdown
                break;
            }
        }
    }

    /// Check if shutdown was signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Controller for triggering shutdown
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Trigger shutdown. Repeated calls are harmless.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
        info!("Shutdown signal sent");
    }
}

/// Create a new shutdown signal pair
///
/// Returns (controller, signal) where:
/// - controller: Used to trigger shutdown
/// - signal: Cloned and passed to components that need to listen
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// A source of process termination requests
///
/// Yields the name of each request as it arrives, or `None` once no further
/// requests can be delivered.
#[async_trait]
pub trait TerminationSource: Send {
    async fn next_request(&mut self) -> Option<&'static str>;
}

/// Termination requests from OS signals (SIGTERM and SIGINT)
#[cfg(unix)]
pub struct SignalListener {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    /// Register the signal handlers
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl TerminationSource for SignalListener {
    async fn next_request(&mut self) -> Option<&'static str> {
        tokio::select! {
            Some(()) = self.sigterm.recv() => {
                info!("Received SIGTERM");
                Some("SIGTERM")
            }
            Some(()) = self.sigint.recv() => {
                info!("Received SIGINT");
                Some("SIGINT")
            }
            else => None,
        }
    }
}

/// Termination requests from Ctrl+C (Windows)
#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
#[async_trait]
impl TerminationSource for SignalListener {
    async fn next_request(&mut self) -> Option<&'static str> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                Some("CTRL_C")
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to wait for Ctrl+C");
                None
            }
        }
    }
}

/// Channel-fed termination requests, for embedding and tests
#[async_trait]
impl TerminationSource for mpsc::Receiver<&'static str> {
    async fn next_request(&mut self) -> Option<&'static str> {
        self.recv().await
    }
}
