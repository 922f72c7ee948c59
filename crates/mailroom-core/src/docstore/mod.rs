//! MongoDB document store
//!
//! The client is created lazily on the first operation and reused by every
//! later call. Each operation, including the initial connect, is bounded by
//! the configured timeout.

mod convert;

pub use convert::{bson_to_json, to_document, to_json, to_pipeline};

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::MongoConfig;
use crate::error::{Error, Result};
use crate::services::{DocumentStore, JsonDocument, UpdateSummary};

/// MongoDB-backed [`DocumentStore`]
pub struct MongoDocumentStore {
    config: MongoConfig,
    client: OnceCell<Client>,
    /// Client constructions started; a failed one leaves the cell empty
    connect_attempts: AtomicUsize,
}

impl MongoDocumentStore {
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Run `fut` under the configured timeout
    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.timeout(), fut)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("mongodb {}", operation),
                secs: self.config.timeout_secs,
            })?;
        debug!(
            "mongodb {} finished in {}ms",
            operation,
            started.elapsed().as_millis()
        );
        result
    }

    async fn database(&self) -> Result<Database> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let attempt = self.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    "Connecting to MongoDB database {} (attempt {})",
                    self.config.database, attempt
                );
                let client = Client::with_uri_str(&self.config.uri).await?;
                Ok::<_, Error>(client)
            })
            .await?;
        Ok(client.database(&self.config.database))
    }

    async fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection::<Document>(name))
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.bounded("listCollections", async {
            let names = self.database().await?.list_collection_names().await?;
            Ok(names)
        })
        .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: JsonDocument,
        limit: i64,
    ) -> Result<Vec<Value>> {
        let filter = to_document(filter)?;
        self.bounded("find", async {
            let cursor = self
                .collection(collection)
                .await?
                .find(filter)
                .limit(limit)
                .await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok(docs.into_iter().map(to_json).collect())
        })
        .await
    }

    async fn insert_one(&self, collection: &str, document: JsonDocument) -> Result<Value> {
        let document = to_document(document)?;
        self.bounded("insertOne", async {
            let result = self.collection(collection).await?.insert_one(document).await?;
            Ok(bson_to_json(result.inserted_id))
        })
        .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: JsonDocument,
        update: JsonDocument,
    ) -> Result<UpdateSummary> {
        let filter = to_document(filter)?;
        let update = to_document(update)?;
        self.bounded("updateMany", async {
            let result = self
                .collection(collection)
                .await?
                .update_many(filter, update)
                .await?;
            Ok(UpdateSummary {
                matched: result.matched_count,
                modified: result.modified_count,
            })
        })
        .await
    }

    async fn delete_many(&self, collection: &str, filter: JsonDocument) -> Result<u64> {
        let filter = to_document(filter)?;
        self.bounded("deleteMany", async {
            let result = self.collection(collection).await?.delete_many(filter).await?;
            Ok(result.deleted_count)
        })
        .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<JsonDocument>,
    ) -> Result<Vec<Value>> {
        let pipeline = to_pipeline(pipeline)?;
        self.bounded("aggregate", async {
            let cursor = self.collection(collection).await?.aggregate(pipeline).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok(docs.into_iter().map(to_json).collect())
        })
        .await
    }

    async fn count(&self, collection: &str, filter: JsonDocument) -> Result<u64> {
        let filter = to_document(filter)?;
        self.bounded("countDocuments", async {
            let count = self
                .collection(collection)
                .await?
                .count_documents(filter)
                .await?;
            Ok(count)
        })
        .await
    }

    async fn close(&self) {
        let Some(client) = self.client.get() else {
            debug!("MongoDB client never opened, nothing to close");
            return;
        };
        match tokio::time::timeout(self.timeout(), client.clone().shutdown()).await {
            Ok(()) => info!("Closed MongoDB connection"),
            Err(_) => warn!("Timed out closing MongoDB connection"),
        }
    }
}
