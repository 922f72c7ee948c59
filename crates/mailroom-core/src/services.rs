//! Collaborator interfaces the tool handlers call through
//!
//! Each external service is reached through a narrow async trait so the
//! dispatcher can be driven by real clients in production and by in-memory
//! fakes in tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Order-preserving JSON object used for filters, updates and documents
pub type JsonDocument = serde_json::Map<String, Value>;

/// Minimal message reference returned by a mailbox search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStub {
    pub id: String,
    pub thread_id: String,
}

/// Outgoing message as requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Comma-separated recipient list
    pub to: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// Email provider (Gmail in production)
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Search the mailbox. `query` uses the provider's search syntax.
    async fn search_messages(&self, query: Option<&str>, max_results: u32)
        -> Result<Vec<MessageStub>>;

    /// Full message resource as returned by the provider
    async fn get_message(&self, message_id: &str) -> Result<Value>;

    /// Send a message, returning the provider's id for it
    async fn send_message(&self, email: &OutgoingEmail) -> Result<String>;

    /// Wire-encoded attachment bytes
    async fn fetch_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String>;
}

/// Counts reported by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    pub matched: u64,
    pub modified: u64,
}

/// Document database (MongoDB in production)
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn find(&self, collection: &str, filter: JsonDocument, limit: i64)
        -> Result<Vec<Value>>;

    /// Insert one document, returning its id as relaxed extended JSON
    async fn insert_one(&self, collection: &str, document: JsonDocument) -> Result<Value>;

    async fn update_many(
        &self,
        collection: &str,
        filter: JsonDocument,
        update: JsonDocument,
    ) -> Result<UpdateSummary>;

    async fn delete_many(&self, collection: &str, filter: JsonDocument) -> Result<u64>;

    async fn aggregate(&self, collection: &str, pipeline: Vec<JsonDocument>)
        -> Result<Vec<Value>>;

    async fn count(&self, collection: &str, filter: JsonDocument) -> Result<u64>;

    /// Release the connection, if one was opened
    async fn close(&self) {}
}

/// Spreadsheet file writer
#[async_trait]
pub trait SpreadsheetWriter: Send + Sync {
    /// Write `rows` to a single-sheet workbook at `path`, returning the
    /// absolute path written
    async fn write(&self, rows: Vec<JsonDocument>, sheet_name: &str, path: &Path)
        -> Result<PathBuf>;
}

/// Handles to every collaborator, built once by the entry point
#[derive(Clone)]
pub struct Services {
    pub email: Arc<dyn EmailProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub spreadsheets: Arc<dyn SpreadsheetWriter>,
}
