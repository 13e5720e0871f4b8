//! Relational store handle (PostgreSQL via sqlx)

use super::{DependencyProbe, ProbeError, Service};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

pub struct PostgresHandle {
    pool: PgPool,
}

impl PostgresHandle {
    /// Open the pool and make sure at least one connection can be established
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ProbeError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        debug!(max_connections, "PostgreSQL pool opened");

        Ok(Self { pool })
    }
}

#[async_trait]
impl DependencyProbe for PostgresHandle {
    fn service(&self) -> Service {
        Service::Relational
    }

    async fn probe(&self) -> Result<String, ProbeError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
            .fetch_one(&self.pool)
            .await?;

        Ok(format!("Connected: {}", now.to_rfc3339()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
