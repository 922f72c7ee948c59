//! Mailroom Core Library
//!
//! MCP tools for Gmail, MongoDB and Excel, with an attachment normalizer
//! that turns spreadsheets, Word documents, images and PDFs into content a
//! text-oriented client can read.

pub mod attachment;
pub mod config;
pub mod docstore;
pub mod error;
pub mod gmail;
pub mod mcp;
pub mod oauth;
pub mod services;
pub mod token_provider;
pub mod xlsx_writer;

use std::sync::Arc;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use services::Services;

/// Application name for config paths
pub const APP_NAME: &str = "mailroom";

/// Build the production collaborators from configuration. Nothing connects
/// until a tool first needs the service.
pub fn build_services(config: &Config) -> Result<Services> {
    let email = gmail::GmailClient::new(config.gmail.clone())?;
    let documents = docstore::MongoDocumentStore::new(config.mongodb.clone());

    Ok(Services {
        email: Arc::new(email),
        documents: Arc::new(documents),
        spreadsheets: Arc::new(xlsx_writer::XlsxSpreadsheetWriter),
    })
}
