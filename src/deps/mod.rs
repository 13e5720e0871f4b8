//! Backing service handles and liveness probes
//!
//! Each backing service (relational store, cache, document store, broker) is
//! reached through one long-lived handle created during bootstrap and closed
//! once during shutdown. Handles are never recreated.
//!
//! A probe is one minimal round trip against a handle. Probe errors never
//! escape `probe_once`: they are folded into a failed `ProbeResult`.

pub mod bootstrap;
pub mod kafka;
pub mod mongo;
pub mod postgres;
pub mod redis;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use bootstrap::{bootstrap, BootstrapError, Connector, LiveConnector};

/// The four backing services, in bootstrap order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Relational,
    Cache,
    Document,
    Broker,
}

impl Service {
    /// All services in bootstrap (and probe) order
    pub const ALL: [Service; 4] = [
        Service::Relational,
        Service::Cache,
        Service::Document,
        Service::Broker,
    ];

    /// Key used for this service in the `/health` payload
    pub fn status_key(self) -> &'static str {
        match self {
            Service::Relational => "dbStatus",
            Service::Cache => "redisStatus",
            Service::Document => "mongoStatus",
            Service::Broker => "kafkaStatus",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Relational => "relational",
            Service::Cache => "cache",
            Service::Document => "document",
            Service::Broker => "broker",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Document cannot be stored: {0}")]
    InvalidDocument(String),

    #[error("{0} handle is not connected")]
    NotConnected(Service),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of one probe call. Produced fresh each time, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub service: Service,
    pub ok: bool,
    pub detail: String,
}

/// A live connection to a backing service that can be probed and closed
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    fn service(&self) -> Service;

    /// Perform one idempotent round trip, returning descriptive status text.
    async fn probe(&self) -> Result<String, ProbeError>;

    /// Release the underlying connection. Called once, during shutdown.
    async fn close(&self);
}

/// A document store handle that also accepts inserts
#[async_trait]
pub trait DocumentStore: DependencyProbe {
    /// Insert one document and return its generated id
    async fn insert_document(&self, fields: Map<String, Value>) -> Result<String, ProbeError>;

    fn as_probe(&self) -> &dyn DependencyProbe;
}

/// Run one probe, converting any error into a failed result
pub async fn probe_once(probe: &dyn DependencyProbe) -> ProbeResult {
    let service = probe.service();
    match probe.probe().await {
        Ok(detail) => {
            debug!(service = %service, detail = %detail, "Probe succeeded");
            ProbeResult {
                service,
                ok: true,
                detail,
            }
        }
        Err(e) => {
            warn!(service = %service, error = %e, "Probe failed");
            ProbeResult {
                service,
                ok: false,
                detail: e.to_string(),
            }
        }
    }
}

/// The set of dependency handles owned by the process
#[derive(Default)]
pub struct Dependencies {
    relational: Option<Arc<dyn DependencyProbe>>,
    cache: Option<Arc<dyn DependencyProbe>>,
    document: Option<Arc<dyn DocumentStore>>,
    broker: Option<Arc<dyn DependencyProbe>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relational(mut self, handle: Arc<dyn DependencyProbe>) -> Self {
        self.relational = Some(handle);
        self
    }

    pub fn with_cache(mut self, handle: Arc<dyn DependencyProbe>) -> Self {
        self.cache = Some(handle);
        self
    }

    pub fn with_document(mut self, handle: Arc<dyn DocumentStore>) -> Self {
        self.document = Some(handle);
        self
    }

    pub fn with_broker(mut self, handle: Arc<dyn DependencyProbe>) -> Self {
        self.broker = Some(handle);
        self
    }

    /// Handle for a service, if one was established
    pub fn get(&self, service: Service) -> Option<&dyn DependencyProbe> {
        match service {
            Service::Relational => self.relational.as_deref(),
            Service::Cache => self.cache.as_deref(),
            Service::Document => self.document.as_deref().map(|d| d.as_probe()),
            Service::Broker => self.broker.as_deref(),
        }
    }

    pub fn document(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.document.as_ref()
    }

    /// True when every handle is present. In-memory check only.
    pub fn all_present(&self) -> bool {
        Service::ALL.iter().all(|s| self.get(*s).is_some())
    }

    /// Probe one service; a missing handle counts as a failure
    pub async fn probe(&self, service: Service) -> ProbeResult {
        match self.get(service) {
            Some(handle) => probe_once(handle).await,
            None => ProbeResult {
                service,
                ok: false,
                detail: ProbeError::NotConnected(service).to_string(),
            },
        }
    }

    /// Close every present handle in bootstrap order
    pub async fn close_all(&self) {
        for service in Service::ALL {
            if let Some(handle) = self.get(service) {
                handle.close().await;
                info!(service = %service, "Closed connection");
            }
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for service in Service::ALL {
            list.entry(&service.as_str(), &self.get(service).is_some());
        }
        list.finish()
    }
}

#[cfg(test)]
#[path = "deps_test.rs"]
mod tests;
