//! JSON <-> BSON conversion at the document-store boundary
//!
//! Inbound objects are parsed as extended JSON, so `{"$oid": "..."}` and
//! `{"$date": "..."}` reach the database as native types. Outbound documents
//! are rendered as relaxed extended JSON.

use mongodb::bson::{Bson, Document};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::services::JsonDocument;

/// Convert an order-preserving JSON object into a BSON document
pub fn to_document(object: JsonDocument) -> Result<Document> {
    match Bson::try_from(Value::Object(object)) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(Error::DocumentStore(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
        Err(e) => Err(Error::DocumentStore(format!("invalid extended JSON: {}", e))),
    }
}

/// Convert each stage of an aggregation pipeline
pub fn to_pipeline(stages: Vec<JsonDocument>) -> Result<Vec<Document>> {
    stages.into_iter().map(to_document).collect()
}

/// Render a BSON document as relaxed extended JSON
pub fn to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

/// Render any BSON value (e.g. an inserted id) as relaxed extended JSON
pub fn bson_to_json(value: Bson) -> Value {
    value.into_relaxed_extjson()
}
