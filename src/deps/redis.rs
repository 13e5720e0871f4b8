//! Cache handle (Redis)

use super::{DependencyProbe, ProbeError, Service};
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct RedisHandle {
    // Taken on close so no further commands reuse the connection
    manager: Mutex<Option<ConnectionManager>>,
}

impl RedisHandle {
    pub async fn connect(url: &str) -> Result<Self, ProbeError> {
        let client = ::redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;

        Ok(Self {
            manager: Mutex::new(Some(manager)),
        })
    }
}

#[async_trait]
impl DependencyProbe for RedisHandle {
    fn service(&self) -> Service {
        Service::Cache
    }

    async fn probe(&self) -> Result<String, ProbeError> {
        // ConnectionManager is a cheap clone over one multiplexed connection
        let mut conn = self
            .manager
            .lock()
            .await
            .clone()
            .ok_or(ProbeError::NotConnected(Service::Cache))?;

        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(ProbeError::UnexpectedResponse(pong));
        }

        Ok(format!("Connected: {}", pong))
    }

    async fn close(&self) {
        // Dropping the last manager clone closes the multiplexed connection
        drop(self.manager.lock().await.take());
    }
}
