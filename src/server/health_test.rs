//! Tests for the health views

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::deps::mock::MockSet;
use crate::server::metrics::create_metrics;

fn aggregator(mocks: &MockSet) -> (HealthAggregator, LifecycleState) {
    let lifecycle = LifecycleState::new();
    let aggregator = HealthAggregator::new(
        Arc::new(mocks.dependencies()),
        lifecycle.clone(),
        create_metrics().unwrap(),
    );
    (aggregator, lifecycle)
}

#[tokio::test]
async fn test_health_reports_every_service() {
    let mocks = MockSet::healthy();
    let (aggregator, _) = aggregator(&mocks);

    let report = aggregator.health().await;

    assert!(report.healthy());
    let payload = report.payload();
    assert_eq!(payload["dbStatus"], "relational OK");
    assert_eq!(payload["redisStatus"], "cache OK");
    assert_eq!(payload["mongoStatus"], "document OK");
    assert_eq!(payload["kafkaStatus"], "broker OK");
}

/// Health runs all four probes even after an early failure
#[tokio::test]
async fn test_health_continues_after_failure() {
    let mocks = MockSet::healthy();
    mocks.cache.set_healthy(false);
    let (aggregator, _) = aggregator(&mocks);

    let report = aggregator.health().await;

    assert!(!report.healthy());
    assert_eq!(mocks.probe_counts(), [1, 1, 1, 1]);
    assert_eq!(mocks.calls(), Service::ALL.to_vec());

    let payload = report.payload();
    assert_eq!(payload["dbStatus"], "relational OK");
    assert!(payload["redisStatus"]
        .as_str()
        .unwrap()
        .contains("cache unreachable"));
    assert_eq!(payload["mongoStatus"], "document OK");
    assert_eq!(payload["kafkaStatus"], "broker OK");
}

#[tokio::test]
async fn test_health_is_read_only() {
    let mocks = MockSet::healthy();
    let (aggregator, lifecycle) = aggregator(&mocks);

    aggregator.health().await;

    assert!(!lifecycle.is_ready());
    assert!(!lifecycle.is_started());
    assert!(!lifecycle.is_healthy());
}

#[tokio::test]
async fn test_health_response_status_codes() {
    let mocks = MockSet::healthy();
    let (aggregator, _) = aggregator(&mocks);

    let ok = aggregator.health().await.into_response();
    assert_eq!(ok.status(), StatusCode::OK);

    mocks.broker.set_healthy(false);
    let failed = aggregator.health().await.into_response();
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// Liveness stops at the first failing probe
#[tokio::test]
async fn test_liveness_short_circuits() {
    let mocks = MockSet::healthy();
    mocks.cache.set_healthy(false);
    let (aggregator, lifecycle) = aggregator(&mocks);

    let verdict = aggregator.liveness().await;

    assert!(!verdict.ok);
    assert_eq!(verdict.message, "Liveness check failed: cache is unreachable");
    assert_eq!(mocks.calls(), vec![Service::Relational, Service::Cache]);
    assert_eq!(mocks.document.probe_count(), 0);
    assert_eq!(mocks.broker.probe_count(), 0);
    assert!(!lifecycle.is_healthy());
}

#[tokio::test]
async fn test_liveness_records_healthy() {
    let mocks = MockSet::healthy();
    let (aggregator, lifecycle) = aggregator(&mocks);

    let verdict = aggregator.liveness().await;

    assert!(verdict.ok);
    assert_eq!(mocks.calls(), Service::ALL.to_vec());
    assert!(lifecycle.is_healthy());

    mocks.relational.set_healthy(false);
    assert!(!aggregator.liveness().await.ok);
    assert!(!lifecycle.is_healthy());
}

/// Readiness stops at the first failing probe
#[tokio::test]
async fn test_readiness_short_circuits() {
    let mocks = MockSet::healthy();
    mocks.cache.set_healthy(false);
    let (aggregator, lifecycle) = aggregator(&mocks);

    let verdict = aggregator.readiness().await;

    assert!(!verdict.ok);
    assert_eq!(mocks.probe_counts(), [1, 1, 0, 0]);
    assert!(!lifecycle.is_ready());
    assert_eq!(
        verdict.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_readiness_marks_ready() {
    let mocks = MockSet::healthy();
    let (aggregator, lifecycle) = aggregator(&mocks);

    let verdict = aggregator.readiness().await;

    assert_eq!(verdict, Verdict::pass("Ready"));
    assert!(lifecycle.is_ready());
}

#[tokio::test]
async fn test_readiness_fails_while_draining_without_probing() {
    let mocks = MockSet::healthy();
    let (aggregator, lifecycle) = aggregator(&mocks);
    lifecycle.begin_draining();

    let verdict = aggregator.readiness().await;

    assert!(!verdict.ok);
    assert_eq!(verdict.message, "Not ready: shutting down");
    assert_eq!(mocks.probe_counts(), [0, 0, 0, 0]);
    assert!(!lifecycle.is_ready());
}

/// Startup is a pure in-memory check
#[tokio::test]
async fn test_startup_performs_no_probes() {
    let mocks = MockSet::healthy();
    let (aggregator, lifecycle) = aggregator(&mocks);

    let verdict = aggregator.startup();

    assert!(verdict.ok);
    assert!(lifecycle.is_started());
    assert_eq!(mocks.probe_counts(), [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_startup_ignores_probe_health() {
    let mocks = MockSet::healthy();
    for service in Service::ALL {
        mocks.handle(service).set_healthy(false);
    }
    let (aggregator, _) = aggregator(&mocks);

    assert!(aggregator.startup().ok);
    assert_eq!(mocks.probe_counts(), [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_startup_fails_with_missing_handle() {
    let mocks = MockSet::healthy();
    let lifecycle = LifecycleState::new();
    let dependencies = Dependencies::new()
        .with_relational(mocks.relational.clone())
        .with_cache(mocks.cache.clone())
        .with_broker(mocks.broker.clone());
    let aggregator = HealthAggregator::new(
        Arc::new(dependencies),
        lifecycle.clone(),
        create_metrics().unwrap(),
    );

    let verdict = aggregator.startup();

    assert!(!verdict.ok);
    assert_eq!(verdict.message, "Startup incomplete: missing document");
    assert!(!lifecycle.is_started());
}

#[tokio::test]
async fn test_probes_are_counted_in_metrics() {
    let mocks = MockSet::healthy();
    mocks.document.set_healthy(false);
    let metrics = create_metrics().unwrap();
    let aggregator = HealthAggregator::new(
        Arc::new(mocks.dependencies()),
        LifecycleState::new(),
        metrics.clone(),
    );

    aggregator.health().await;

    let body = metrics.encode().unwrap();
    assert!(body.contains(r#"vigil_probes_total{outcome="error",service="document"} 1"#));
    assert!(body.contains(r#"vigil_probes_total{outcome="ok",service="relational"} 1"#));
}
