//! Document store handle (MongoDB)

use super::{DependencyProbe, DocumentStore, ProbeError, Service};
use async_trait::async_trait;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use tracing::debug;

pub struct MongoHandle {
    client: Client,
    collection: Collection<Document>,
}

impl MongoHandle {
    /// Connect and verify the deployment answers a ping.
    ///
    /// The driver connects lazily, so without the ping an unreachable
    /// server would only surface on the first request.
    pub async fn connect(url: &str, database: &str, collection: &str) -> Result<Self, ProbeError> {
        let client = Client::with_uri_str(url).await?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        debug!(database, collection, "MongoDB client connected");

        let collection = client.database(database).collection::<Document>(collection);
        Ok(Self { client, collection })
    }
}

#[async_trait]
impl DependencyProbe for MongoHandle {
    fn service(&self) -> Service {
        Service::Document
    }

    async fn probe(&self) -> Result<String, ProbeError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        match reply.get("ok") {
            Some(Bson::Double(ok)) if *ok == 1.0 => Ok("Connected".to_string()),
            Some(Bson::Int32(1)) | Some(Bson::Int64(1)) => Ok("Connected".to_string()),
            other => Err(ProbeError::UnexpectedResponse(format!(
                "ping returned ok={:?}",
                other
            ))),
        }
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Convert JSON fields to BSON, rejecting the whole document if any field
/// has no BSON representation (e.g. integers above `i64::MAX`).
pub fn to_document(fields: Map<String, Value>) -> Result<Document, ProbeError> {
    let mut document = Document::new();
    for (key, value) in fields {
        let bson = to_bson(&value)
            .map_err(|e| ProbeError::InvalidDocument(format!("field `{}`: {}", key, e)))?;
        document.insert(key, bson);
    }
    Ok(document)
}

#[async_trait]
impl DocumentStore for MongoHandle {
    async fn insert_document(&self, fields: Map<String, Value>) -> Result<String, ProbeError> {
        let mut document = to_document(fields)?;
        document.insert("createdAt", Bson::DateTime(mongodb::bson::DateTime::now()));

        let result = self.collection.insert_one(document).await?;
        let id = match result.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };

        Ok(id)
    }

    fn as_probe(&self) -> &dyn DependencyProbe {
        self
    }
}
