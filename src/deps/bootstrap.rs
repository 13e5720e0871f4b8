//! One-time startup sequence establishing every backing service connection
//!
//! Connections are opened in a fixed order (relational, cache, document,
//! broker). The first failure aborts bootstrap: there is no retry and handles
//! opened before the failure are simply dropped.

use super::kafka::KafkaHandle;
use super::mongo::MongoHandle;
use super::postgres::PostgresHandle;
use super::redis::RedisHandle;
use super::{Dependencies, DependencyProbe, DocumentStore, ProbeError, Service};
use crate::config::BackendConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to connect to {service} store: {source}")]
    Connect {
        service: Service,
        #[source]
        source: ProbeError,
    },
}

/// Opens the handle for each backing service
///
/// Production code uses `LiveConnector`. Tests substitute connectors that
/// fail at a chosen service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn relational(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError>;
    async fn cache(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError>;
    async fn document(&self) -> Result<Arc<dyn DocumentStore>, ProbeError>;
    async fn broker(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError>;
}

/// Connector that opens real client connections from configuration
pub struct LiveConnector {
    config: BackendConfig,
}

impl LiveConnector {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for LiveConnector {
    async fn relational(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        let handle = PostgresHandle::connect(
            &self.config.database_url,
            self.config.database_max_connections,
        )
        .await?;
        Ok(Arc::new(handle))
    }

    async fn cache(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        Ok(Arc::new(RedisHandle::connect(&self.config.redis_url).await?))
    }

    async fn document(&self) -> Result<Arc<dyn DocumentStore>, ProbeError> {
        let handle = MongoHandle::connect(
            &self.config.mongo_url,
            &self.config.mongo_database,
            &self.config.mongo_collection,
        )
        .await?;
        Ok(Arc::new(handle))
    }

    async fn broker(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        let handle = KafkaHandle::connect(
            &self.config.kafka_brokers,
            &self.config.kafka_health_topic,
            self.config.kafka_message_timeout.0,
        )
        .await?;
        Ok(Arc::new(handle))
    }
}

fn connect_failed(service: Service) -> impl FnOnce(ProbeError) -> BootstrapError {
    move |source| {
        error!(service = %service, error = %source, "Bootstrap failed");
        BootstrapError::Connect { service, source }
    }
}

fn connected(service: Service, started: Instant) {
    info!(
        service = %service,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Connected"
    );
}

/// Establish all dependency handles, failing fast on the first error
pub async fn bootstrap(connector: &dyn Connector) -> Result<Dependencies, BootstrapError> {
    let started = Instant::now();

    let relational = connector
        .relational()
        .await
        .map_err(connect_failed(Service::Relational))?;
    connected(Service::Relational, started);

    let cache = connector
        .cache()
        .await
        .map_err(connect_failed(Service::Cache))?;
    connected(Service::Cache, started);

    let document = connector
        .document()
        .await
        .map_err(connect_failed(Service::Document))?;
    connected(Service::Document, started);

    let broker = connector
        .broker()
        .await
        .map_err(connect_failed(Service::Broker))?;
    connected(Service::Broker, started);

    Ok(Dependencies::new()
        .with_relational(relational)
        .with_cache(cache)
        .with_document(document)
        .with_broker(broker))
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
