//! Router and application endpoints
//!
//! Probe routes (`/health`, `/liveness`, `/readiness`, `/startup`) and
//! `/metrics` are always served. Application routes (`/`, `/long-process`,
//! `/insert-mongo`) are rejected with 503 once draining has begun. An admitted
//! application request counts as pending work from admission until its
//! response is produced, body upload included.

use super::error::ApiError;
use super::health::{self, HealthAggregator};
use super::metrics::SharedMetrics;
use super::shutdown::ShutdownSignal;
use crate::deps::{Dependencies, ProbeError};
use crate::lifecycle::{LifecycleState, PendingWorkTracker};
use axum::{
    body::Bytes,
    extract::{FromRef, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub health: HealthAggregator,
    pub lifecycle: LifecycleState,
    pub tracker: PendingWorkTracker,
    pub dependencies: Arc<Dependencies>,
    pub metrics: SharedMetrics,
    pub long_process_delay: Duration,
}

impl AppState {
    pub fn new(
        dependencies: Arc<Dependencies>,
        lifecycle: LifecycleState,
        tracker: PendingWorkTracker,
        metrics: SharedMetrics,
        long_process_delay: Duration,
    ) -> Self {
        let health =
            HealthAggregator::new(dependencies.clone(), lifecycle.clone(), metrics.clone());
        Self {
            health,
            lifecycle,
            tracker,
            dependencies,
            metrics,
            long_process_delay,
        }
    }
}

impl FromRef<AppState> for HealthAggregator {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn index() -> &'static str {
    "Hello, World!"
}

/// Simulated slow request
async fn long_process(State(state): State<AppState>) -> Json<MessageResponse> {
    info!(
        pending = state.tracker.current(),
        delay_ms = state.long_process_delay.as_millis() as u64,
        "Long process started"
    );

    tokio::time::sleep(state.long_process_delay).await;

    info!("Long process finished");
    Json(MessageResponse {
        message: "Long process completed".to_string(),
    })
}

/// Parse an optional JSON object body. Empty bodies get a default document.
fn document_fields(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        let mut fields = Map::new();
        fields.insert(
            "message".to_string(),
            Value::String("Hello from insert-mongo".to_string()),
        );
        return Ok(fields);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::InvalidBody(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::InvalidBody(e.to_string())),
    }
}

async fn insert_mongo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let fields = document_fields(&body)?;
    let store = state
        .dependencies
        .document()
        .ok_or(ApiError::DocumentStoreUnavailable)?;

    let id = store
        .insert_document(fields)
        .await
        .map_err(|e| match e {
            ProbeError::InvalidDocument(reason) => ApiError::InvalidBody(reason),
            other => ApiError::Insert(other),
        })?;

    info!(id = %id, "Document inserted");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Document inserted with id {}", id),
        }),
    ))
}

/// Prometheus metrics handler
async fn metrics(State(state): State<AppState>) -> Response {
    state.metrics.set_pending_work(state.tracker.current());
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Admit application work as pending, or reject it once draining has begun.
///
/// The guard is taken before the phase is checked: either the drain observes
/// this request as pending, or this request observes the drain.
async fn admit_work(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let _pending = state.tracker.begin();
    if state.lifecycle.is_draining() {
        warn!(path = %request.uri().path(), "Rejecting request while draining");
        return ApiError::Draining.into_response();
    }
    next.run(request).await
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal.into_response()
}

/// Build the router for probe, metrics and application endpoints
pub fn build_router(state: AppState) -> Router {
    let work = Router::new()
        .route("/", get(index))
        .route("/long-process", get(long_process))
        .route("/insert-mongo", post(insert_mongo))
        .route_layer(middleware::from_fn_with_state(state.clone(), admit_work));

    Router::new()
        .route("/health", get(health::health))
        .route("/liveness", get(health::liveness))
        .route("/readiness", get(health::readiness))
        .route("/startup", get(health::startup))
        .route("/metrics", get(metrics))
        .merge(work)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until `shutdown` fires, then finish open connections
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(state);
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
