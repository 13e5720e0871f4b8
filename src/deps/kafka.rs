//! Broker handle (Kafka via rdkafka)
//!
//! The probe produces one marker message to the health topic. These markers
//! accumulate on the topic; consumers of that topic should ignore them.

use super::{DependencyProbe, ProbeError, Service};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {}

pub struct KafkaHandle {
    producer: FutureProducer<KafkaContext>,
    topic: String,
    message_timeout: Duration,
}

impl KafkaHandle {
    /// Create the producer and fetch cluster metadata so an unreachable
    /// broker fails at startup instead of on the first probe.
    pub async fn connect(
        brokers: &str,
        topic: &str,
        message_timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", brokers)
            .set(
                "message.timeout.ms",
                message_timeout.as_millis().to_string(),
            );

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext)?;

        let metadata_producer = producer.clone();
        let brokers_seen = tokio::task::spawn_blocking(move || {
            metadata_producer
                .client()
                .fetch_metadata(None, Timeout::After(message_timeout))
                .map(|metadata| metadata.brokers().len())
        })
        .await??;
        debug!(brokers = brokers_seen, "Kafka cluster metadata fetched");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            message_timeout,
        })
    }
}

#[async_trait]
impl DependencyProbe for KafkaHandle {
    fn service(&self) -> Service {
        Service::Broker
    }

    async fn probe(&self) -> Result<String, ProbeError> {
        let payload = json!({
            "type": "health-check",
            "id": uuid::Uuid::new_v4().to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
        .to_string();

        let record = FutureRecord::to(&self.topic)
            .key("health-check")
            .payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.message_timeout))
            .await
            .map_err(|(e, _)| ProbeError::Kafka(e))?;

        Ok(format!(
            "Connected: marker delivered to {} [{}] at offset {}",
            self.topic, partition, offset
        ))
    }

    async fn close(&self) {
        let producer = self.producer.clone();
        let timeout = self.message_timeout;
        match tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout))).await {
            Ok(Ok(())) => debug!("Kafka producer flushed"),
            Ok(Err(e)) => warn!(error = %e, "Kafka producer flush failed"),
            Err(e) => warn!(error = %e, "Kafka producer flush task failed"),
        }
    }
}
