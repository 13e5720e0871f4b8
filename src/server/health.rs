//! Health views over the dependency probes
//!
//! - `/health` - Probes every service and reports each one's status (read-only)
//! - `/liveness` - Fails on the first unreachable service, records `healthy`
//! - `/readiness` - Same probes as liveness, marks the instance ready on success
//! - `/startup` - In-memory check that every handle exists, no network
//!
//! Probes always run one after another in bootstrap order. Liveness and
//! readiness stop at the first failure; health always runs all four.

use crate::deps::{Dependencies, ProbeResult, Service};
use crate::lifecycle::LifecycleState;
use crate::server::metrics::SharedMetrics;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Composes dependency probes into the four health views
#[derive(Clone)]
pub struct HealthAggregator {
    dependencies: Arc<Dependencies>,
    lifecycle: LifecycleState,
    metrics: SharedMetrics,
}

/// Per-service results of the `/health` view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub results: Vec<ProbeResult>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    /// JSON payload keyed by each service's status key
    pub fn payload(&self) -> Map<String, Value> {
        self.results
            .iter()
            .map(|r| {
                (
                    r.service.status_key().to_string(),
                    Value::String(r.detail.clone()),
                )
            })
            .collect()
    }
}

impl IntoResponse for HealthReport {
    /// 200 when every service is reachable, 500 otherwise. The body carries
    /// each service's own status in both cases.
    fn into_response(self) -> Response {
        let status = if self.healthy() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(Value::Object(self.payload()))).into_response()
    }
}

/// Pass/fail outcome of the liveness, readiness and startup views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub ok: bool,
    pub message: String,
}

impl Verdict {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for Verdict {
    fn into_response(self) -> Response {
        let status = if self.ok {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, self.message).into_response()
    }
}

impl HealthAggregator {
    pub fn new(
        dependencies: Arc<Dependencies>,
        lifecycle: LifecycleState,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            dependencies,
            lifecycle,
            metrics,
        }
    }

    async fn probe(&self, service: Service) -> ProbeResult {
        let result = self.dependencies.probe(service).await;
        self.metrics.record_probe(service.as_str(), result.ok);
        result
    }

    /// Probe in order, stopping at the first failure
    async fn first_failure(&self) -> Option<ProbeResult> {
        for service in Service::ALL {
            let result = self.probe(service).await;
            if !result.ok {
                return Some(result);
            }
        }
        None
    }

    /// Probe every service, even after a failure. Does not change any state.
    pub async fn health(&self) -> HealthReport {
        let mut results = Vec::with_capacity(Service::ALL.len());
        for service in Service::ALL {
            results.push(self.probe(service).await);
        }

        let report = HealthReport { results };
        if !report.healthy() {
            warn!(status = ?report.payload(), "Health check failed");
        }
        report
    }

    pub async fn liveness(&self) -> Verdict {
        match self.first_failure().await {
            None => {
                self.lifecycle.set_healthy(true);
                Verdict::pass("Liveness check passed")
            }
            Some(failed) => {
                self.lifecycle.set_healthy(false);
                warn!(service = %failed.service, detail = %failed.detail, "Liveness check failed");
                Verdict::fail(format!(
                    "Liveness check failed: {} is unreachable",
                    failed.service
                ))
            }
        }
    }

    pub async fn readiness(&self) -> Verdict {
        if self.lifecycle.is_draining() {
            return Verdict::fail("Not ready: shutting down");
        }

        if let Some(failed) = self.first_failure().await {
            warn!(service = %failed.service, detail = %failed.detail, "Readiness check failed");
            return Verdict::fail(format!(
                "Readiness check failed: {} is unreachable",
                failed.service
            ));
        }

        if !self.lifecycle.mark_ready() {
            return Verdict::fail("Not ready: shutting down");
        }
        Verdict::pass("Ready")
    }

    /// Succeeds when every dependency handle exists. Performs no probe.
    pub fn startup(&self) -> Verdict {
        let missing: Vec<&str> = Service::ALL
            .iter()
            .filter(|s| self.dependencies.get(**s).is_none())
            .map(|s| s.as_str())
            .collect();

        if !missing.is_empty() {
            return Verdict::fail(format!(
                "Startup incomplete: missing {}",
                missing.join(", ")
            ));
        }

        if !self.lifecycle.is_started() {
            info!("All dependency handles established, startup complete");
        }
        self.lifecycle.mark_started();
        Verdict::pass("Startup complete")
    }
}

pub async fn health(State(aggregator): State<HealthAggregator>) -> HealthReport {
    aggregator.health().await
}

pub async fn liveness(State(aggregator): State<HealthAggregator>) -> Verdict {
    aggregator.liveness().await
}

pub async fn readiness(State(aggregator): State<HealthAggregator>) -> Verdict {
    aggregator.readiness().await
}

pub async fn startup(State(aggregator): State<HealthAggregator>) -> Verdict {
    aggregator.startup()
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
