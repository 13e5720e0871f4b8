//! Prometheus metrics for probes and drain
//!
//! Each server owns its own registry so tests can create as many as they like.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

pub type SharedMetrics = Arc<ServiceMetrics>;

pub struct ServiceMetrics {
    registry: Registry,
    probes_total: IntCounterVec,
    pending_work: IntGauge,
    drains_total: IntCounterVec,
}

/// Create the metrics registry with every metric registered
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    let registry = Registry::new();

    let probes_total = IntCounterVec::new(
        Opts::new(
            "vigil_probes_total",
            "Dependency probes performed, by service and outcome",
        ),
        &["service", "outcome"],
    )?;
    let pending_work = IntGauge::new(
        "vigil_pending_work",
        "Long-running handlers currently in flight",
    )?;
    let drains_total = IntCounterVec::new(
        Opts::new("vigil_drains_total", "Drains performed, by outcome"),
        &["outcome"],
    )?;

    registry.register(Box::new(probes_total.clone()))?;
    registry.register(Box::new(pending_work.clone()))?;
    registry.register(Box::new(drains_total.clone()))?;

    Ok(Arc::new(ServiceMetrics {
        registry,
        probes_total,
        pending_work,
        drains_total,
    }))
}

impl ServiceMetrics {
    pub fn record_probe(&self, service: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.probes_total
            .with_label_values(&[service, outcome])
            .inc();
    }

    pub fn set_pending_work(&self, pending: usize) {
        self.pending_work.set(pending as i64);
    }

    pub fn record_drain(&self, outcome: &str) {
        self.drains_total.with_label_values(&[outcome]).inc();
    }

    /// Encode every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
