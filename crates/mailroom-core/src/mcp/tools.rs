//! MCP tool registry and handlers

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::args::*;
use super::protocol::{ToolDefinition, ToolResult};
use crate::attachment::{self, AttachmentDescriptor};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{OutgoingEmail, Services};

/// Every registered tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchEmails,
    ReadEmail,
    SendEmail,
    GetAttachment,
    ListCollections,
    FindDocuments,
    InsertDocument,
    UpdateDocuments,
    DeleteDocuments,
    Aggregate,
    CountDocuments,
    CreateExcelSheet,
}

impl ToolName {
    pub const ALL: [ToolName; 12] = [
        ToolName::SearchEmails,
        ToolName::ReadEmail,
        ToolName::SendEmail,
        ToolName::GetAttachment,
        ToolName::ListCollections,
        ToolName::FindDocuments,
        ToolName::InsertDocument,
        ToolName::UpdateDocuments,
        ToolName::DeleteDocuments,
        ToolName::Aggregate,
        ToolName::CountDocuments,
        ToolName::CreateExcelSheet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SearchEmails => "search_emails",
            ToolName::ReadEmail => "read_email",
            ToolName::SendEmail => "send_email",
            ToolName::GetAttachment => "get_attachment",
            ToolName::ListCollections => "list_collections",
            ToolName::FindDocuments => "find_documents",
            ToolName::InsertDocument => "insert_document",
            ToolName::UpdateDocuments => "update_documents",
            ToolName::DeleteDocuments => "delete_documents",
            ToolName::Aggregate => "aggregate",
            ToolName::CountDocuments => "count_documents",
            ToolName::CreateExcelSheet => "create_excel_sheet",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| Error::ToolNotFound(s.to_string()))
    }
}

fn tool(name: ToolName, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Get all tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // Email tools
        tool(
            ToolName::SearchEmails,
            "Search emails using Gmail search operators (e.g. 'from:alice has:attachment newer_than:7d'). Returns message and thread ids.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Gmail search query. Omit to list the most recent messages."
                    },
                    "maxResults": {
                        "type": "number",
                        "default": DEFAULT_MAX_RESULTS
                    }
                }
            }),
        ),
        tool(
            ToolName::ReadEmail,
            "Get the full email, including body parts and attachment ids",
            json!({
                "type": "object",
                "properties": {
                    "messageId": {"type": "string"}
                },
                "required": ["messageId"]
            }),
        ),
        tool(
            ToolName::SendEmail,
            "Send an email as plain text or HTML",
            json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Recipient address; separate several with commas"
                    },
                    "subject": {"type": "string"},
                    "body": {"type": "string"},
                    "isHtml": {"type": "boolean", "default": false}
                },
                "required": ["to", "subject", "body"]
            }),
        ),
        tool(
            ToolName::GetAttachment,
            "Fetch an attachment and convert it for reading: spreadsheets become CSV, Word documents become Markdown, images become PNG, PDFs are returned as an embedded resource",
            json!({
                "type": "object",
                "properties": {
                    "messageId": {"type": "string"},
                    "attachmentId": {"type": "string"},
                    "mimeType": {
                        "type": "string",
                        "description": "MIME type reported for the attachment part"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Attachment filename; used to infer the type when mimeType is generic"
                    }
                },
                "required": ["messageId", "attachmentId", "mimeType"]
            }),
        ),
        // Document tools
        tool(
            ToolName::ListCollections,
            "List all collections",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            ToolName::FindDocuments,
            "Find documents with an optional filter",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "filter": {"type": "object", "default": {}},
                    "limit": {"type": "number", "default": DEFAULT_FIND_LIMIT}
                },
                "required": ["collection"]
            }),
        ),
        tool(
            ToolName::InsertDocument,
            "Insert a document",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "document": {"type": "object"}
                },
                "required": ["collection", "document"]
            }),
        ),
        tool(
            ToolName::UpdateDocuments,
            "Update every document matching the filter",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "filter": {"type": "object"},
                    "update": {
                        "type": "object",
                        "description": "Update operators, e.g. {\"$set\": {\"status\": \"done\"}}"
                    }
                },
                "required": ["collection", "filter", "update"]
            }),
        ),
        tool(
            ToolName::DeleteDocuments,
            "Delete every document matching the filter",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "filter": {"type": "object"}
                },
                "required": ["collection", "filter"]
            }),
        ),
        tool(
            ToolName::Aggregate,
            "Run an aggregation pipeline",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "pipeline": {"type": "array", "items": {"type": "object"}}
                },
                "required": ["collection", "pipeline"]
            }),
        ),
        tool(
            ToolName::CountDocuments,
            "Count documents matching a filter",
            json!({
                "type": "object",
                "properties": {
                    "collection": {"type": "string"},
                    "filter": {"type": "object", "default": {}}
                },
                "required": ["collection"]
            }),
        ),
        // Spreadsheet tools
        tool(
            ToolName::CreateExcelSheet,
            "Create an Excel file from an array of objects. Returns the path of the created file.",
            json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "File to create, e.g. 'report.xlsx'"
                    },
                    "data": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "Rows of the sheet; the header is the union of the objects' keys"
                    },
                    "sheetName": {"type": "string", "default": DEFAULT_SHEET_NAME}
                },
                "required": ["filename", "data"]
            }),
        ),
    ]
}

/// Tool dispatcher
#[derive(Clone)]
pub struct ToolHandler {
    services: Services,
    config: Arc<Config>,
}

impl ToolHandler {
    pub fn new(services: Services, config: Arc<Config>) -> Self {
        Self { services, config }
    }

    /// Run a tool and wrap the outcome in a result envelope. Failures never
    /// escape: they become an `isError` envelope carrying the message.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> ToolResult {
        match self.execute(name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool {} failed ({:?}): {}", name, e.kind(), e);
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Execute a tool
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolResult> {
        let tool: ToolName = name.parse()?;
        debug!("Executing tool: {} with args: {}", tool, arguments);

        match tool {
            // Email tools
            ToolName::SearchEmails => self.search_emails(parse_args(tool, arguments)?).await,
            ToolName::ReadEmail => self.read_email(parse_args(tool, arguments)?).await,
            ToolName::SendEmail => self.send_email(parse_args(tool, arguments)?).await,
            ToolName::GetAttachment => self.get_attachment(parse_args(tool, arguments)?).await,
            // Document tools
            ToolName::ListCollections => self.list_collections().await,
            ToolName::FindDocuments => self.find_documents(parse_args(tool, arguments)?).await,
            ToolName::InsertDocument => self.insert_document(parse_args(tool, arguments)?).await,
            ToolName::UpdateDocuments => {
                self.update_documents(parse_args(tool, arguments)?).await
            }
            ToolName::DeleteDocuments => {
                self.delete_documents(parse_args(tool, arguments)?).await
            }
            ToolName::Aggregate => self.aggregate(parse_args(tool, arguments)?).await,
            ToolName::CountDocuments => self.count_documents(parse_args(tool, arguments)?).await,
            // Spreadsheet tools
            ToolName::CreateExcelSheet => {
                self.create_excel_sheet(parse_args(tool, arguments)?).await
            }
        }
    }

    // ========================================================================
    // Email Operations
    // ========================================================================

    async fn search_emails(&self, args: SearchEmailsArgs) -> Result<ToolResult> {
        let stubs = self
            .services
            .email
            .search_messages(args.query.as_deref(), args.max_results)
            .await?;
        Ok(ToolResult::text(serde_json::to_string(&stubs)?))
    }

    async fn read_email(&self, args: ReadEmailArgs) -> Result<ToolResult> {
        let message = self.services.email.get_message(&args.message_id).await?;
        Ok(ToolResult::json(&message))
    }

    async fn send_email(&self, args: SendEmailArgs) -> Result<ToolResult> {
        if args.to.split(',').all(|addr| addr.trim().is_empty()) {
            return Err(Error::InvalidArguments {
                tool: ToolName::SendEmail.to_string(),
                reason: "at least one recipient is required".to_string(),
            });
        }
        if args.to.contains(['\r', '\n']) {
            return Err(Error::InvalidArguments {
                tool: ToolName::SendEmail.to_string(),
                reason: "recipient list must not contain line breaks".to_string(),
            });
        }

        let email = OutgoingEmail {
            to: args.to,
            subject: args.subject,
            body: args.body,
            is_html: args.is_html,
        };
        let id = self.services.email.send_message(&email).await?;
        Ok(ToolResult::text(format!("Email sent. ID: {}", id)))
    }

    async fn get_attachment(&self, args: GetAttachmentArgs) -> Result<ToolResult> {
        let raw = self
            .services
            .email
            .fetch_attachment(&args.message_id, &args.attachment_id)
            .await?;

        let mut descriptor = AttachmentDescriptor::new(raw, args.mime_type)
            .with_source(args.message_id, args.attachment_id);
        if let Some(filename) = args.filename {
            descriptor = descriptor.with_filename(filename);
        }

        let blocks = tokio::task::spawn_blocking(move || attachment::normalize(&descriptor))
            .await
            .map_err(|e| Error::Other(format!("attachment conversion task failed: {}", e)))??;

        Ok(ToolResult::blocks(blocks))
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    async fn list_collections(&self) -> Result<ToolResult> {
        let names = self.services.documents.list_collections().await?;
        Ok(ToolResult::json(&json!(names)))
    }

    async fn find_documents(&self, args: FindDocumentsArgs) -> Result<ToolResult> {
        let docs = self
            .services
            .documents
            .find(&args.collection, args.filter, args.limit)
            .await?;
        debug!("find on {} returned {} documents", args.collection, docs.len());
        Ok(ToolResult::json(&Value::Array(docs)))
    }

    async fn insert_document(&self, args: InsertDocumentArgs) -> Result<ToolResult> {
        let inserted_id = self
            .services
            .documents
            .insert_one(&args.collection, args.document)
            .await?;
        info!("Inserted document into {}", args.collection);
        Ok(ToolResult::json(&json!({
            "success": true,
            "insertedId": inserted_id
        })))
    }

    async fn update_documents(&self, args: UpdateDocumentsArgs) -> Result<ToolResult> {
        let summary = self
            .services
            .documents
            .update_many(&args.collection, args.filter, args.update)
            .await?;
        info!(
            "Updated {} of {} matched documents in {}",
            summary.modified, summary.matched, args.collection
        );
        Ok(ToolResult::json(&json!({
            "success": true,
            "matchedCount": summary.matched,
            "modifiedCount": summary.modified
        })))
    }

    async fn delete_documents(&self, args: DeleteDocumentsArgs) -> Result<ToolResult> {
        let deleted = self
            .services
            .documents
            .delete_many(&args.collection, args.filter)
            .await?;
        info!("Deleted {} documents from {}", deleted, args.collection);
        Ok(ToolResult::json(&json!({
            "success": true,
            "deletedCount": deleted
        })))
    }

    async fn aggregate(&self, args: AggregateArgs) -> Result<ToolResult> {
        let docs = self
            .services
            .documents
            .aggregate(&args.collection, args.pipeline)
            .await?;
        Ok(ToolResult::json(&Value::Array(docs)))
    }

    async fn count_documents(&self, args: CountDocumentsArgs) -> Result<ToolResult> {
        let count = self
            .services
            .documents
            .count(&args.collection, args.filter)
            .await?;
        Ok(ToolResult::json(&json!({ "count": count })))
    }

    // ========================================================================
    // Spreadsheet Operations
    // ========================================================================

    async fn create_excel_sheet(&self, args: CreateExcelSheetArgs) -> Result<ToolResult> {
        if args.filename.trim().is_empty() {
            return Err(Error::InvalidArguments {
                tool: ToolName::CreateExcelSheet.to_string(),
                reason: "filename must not be empty".to_string(),
            });
        }

        let path = self.config.spreadsheet_path(&args.filename)?;
        let written = self
            .services
            .spreadsheets
            .write(args.data, &args.sheet_name, &path)
            .await?;
        Ok(ToolResult::text(format!(
            "Excel file created: {}",
            written.display()
        )))
    }
}
