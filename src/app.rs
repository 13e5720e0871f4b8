//! Process orchestration
//!
//! Bootstrap every backing service, start the HTTP server, and on the first
//! termination request drain in-flight work, release the dependency handles
//! and stop the listener. A bootstrap failure returns before any listener is
//! bound.

use crate::config::Config;
use crate::deps::{self, Connector, Dependencies};
use crate::lifecycle::{DrainController, DrainOutcome, LifecycleState, PendingWorkTracker};
use crate::server::{
    create_metrics, serve, shutdown_channel, AppState, SharedMetrics, TerminationSource,
};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Grace period for open connections once the listener has been told to stop
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A bootstrapped process, bound but not yet serving
pub struct App {
    config: Config,
    listener: TcpListener,
    dependencies: Arc<Dependencies>,
    lifecycle: LifecycleState,
    tracker: PendingWorkTracker,
    metrics: SharedMetrics,
}

impl App {
    /// Connect to every backing service, then bind the listener
    pub async fn bootstrap(config: Config, connector: &dyn Connector) -> anyhow::Result<Self> {
        let metrics = create_metrics().context("failed to create metrics registry")?;

        let dependencies = deps::bootstrap(connector).await?;

        let addr = config.bind();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self {
            config,
            listener,
            dependencies: Arc::new(dependencies),
            lifecycle: LifecycleState::new(),
            tracker: PendingWorkTracker::new(),
            metrics,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }

    pub fn tracker(&self) -> &PendingWorkTracker {
        &self.tracker
    }

    /// Serve until a termination request has been drained and torn down
    ///
    /// Every request from `termination` is forwarded to the drain controller;
    /// only the first one has any effect.
    pub async fn run<T>(self, mut termination: T) -> anyhow::Result<Option<DrainOutcome>>
    where
        T: TerminationSource + 'static,
    {
        let Self {
            config,
            listener,
            dependencies,
            lifecycle,
            tracker,
            metrics,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(port = addr.port(), "Server is running");
        }

        let state = AppState::new(
            dependencies.clone(),
            lifecycle.clone(),
            tracker.clone(),
            metrics.clone(),
            config.long_process_delay(),
        );
        let (server_stop, server_signal) = shutdown_channel();
        let mut server = tokio::spawn(serve(listener, state, server_signal));

        let drain = Arc::new(DrainController::new(lifecycle, tracker, config.drain()));
        let requests = {
            let drain = drain.clone();
            tokio::spawn(async move {
                while let Some(source) = termination.next_request().await {
                    drain.request_drain(source);
                }
            })
        };

        let outcome = tokio::select! {
            outcome = drain.run(&dependencies) => outcome,
            joined = &mut server => {
                requests.abort();
                dependencies.close_all().await;
                return match joined {
                    Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                    Ok(Err(e)) => Err(anyhow::Error::new(e).context("HTTP server failed")),
                    Err(e) => Err(anyhow::Error::new(e).context("HTTP server task failed")),
                };
            }
        };

        if let Some(outcome) = &outcome {
            metrics.record_drain(outcome.as_str());
        }

        server_stop.shutdown();
        match tokio::time::timeout(SERVER_STOP_TIMEOUT, &mut server).await {
            Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server stopped with error"),
            Ok(Err(e)) => error!(error = %e, "HTTP server task failed"),
            Err(_) => {
                warn!(
                    timeout_secs = SERVER_STOP_TIMEOUT.as_secs(),
                    "HTTP server did not stop in time, aborting open connections"
                );
                server.abort();
            }
        }
        requests.abort();

        info!("Shutdown complete");
        Ok(outcome)
    }
}

/// Bootstrap and serve until shutdown. Returns `Err` only when startup fails.
pub async fn run<T>(config: Config, connector: &dyn Connector, termination: T) -> anyhow::Result<()>
where
    T: TerminationSource + 'static,
{
    let app = App::bootstrap(config, connector).await?;
    app.run(termination).await?;
    Ok(())
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
