//! Error types for Mailroom

use thiserror::Error;

/// Result type alias using Mailroom's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mailroom
#[derive(Error, Debug)]
pub enum Error {
    // Dispatch errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    // Attachment errors
    #[error("Attachment decode error: {0}")]
    Decode(String),

    #[error("Failed to convert {format} attachment: {reason}")]
    Conversion { format: &'static str, reason: String },

    // Authentication errors
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Missing token file at {path}. Run the local auth flow first to generate it.")]
    TokenMissing { path: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Token storage error: {0}")]
    Token(String),

    // Collaborator errors
    #[error("Gmail API error {status}: {body}")]
    Gmail { status: u16, body: String },

    #[error("Unexpected Gmail response: {0}")]
    GmailShape(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Spreadsheet write failed: {0}")]
    SpreadsheetWrite(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse error taxonomy surfaced at the dispatch boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown tool or malformed/missing arguments
    Validation,
    /// Wire-encoded attachment bytes could not be decoded
    Decode,
    /// A format-specific converter failed
    Conversion,
    /// An external service failed or answered with an unexpected shape
    Collaborator,
    /// Local failures (configuration, I/O, serialization)
    Internal,
}

impl Error {
    /// Build a conversion error for the given attachment format
    pub fn conversion(format: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::Conversion {
            format,
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolNotFound(_)
            | Error::InvalidArguments { .. }
            | Error::InvalidRequest(_)
            | Error::McpProtocol(_) => ErrorKind::Validation,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Conversion { .. } => ErrorKind::Conversion,
            Error::OAuth(_)
            | Error::TokenMissing { .. }
            | Error::TokenRefreshFailed(_)
            | Error::Token(_)
            | Error::Gmail { .. }
            | Error::GmailShape(_)
            | Error::DocumentStore(_)
            | Error::Mongo(_)
            | Error::SpreadsheetWrite(_)
            | Error::Timeout { .. }
            | Error::Http(_) => ErrorKind::Collaborator,
            _ => ErrorKind::Internal,
        }
    }

    /// Returns true if the operator needs to re-run the auth flow
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::TokenMissing { .. } | Error::TokenRefreshFailed(_)
        )
    }

    /// Returns an error code suitable for MCP error responses
    pub fn mcp_code(&self) -> &'static str {
        match self {
            Error::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Error::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            Error::InvalidRequest(_) | Error::McpProtocol(_) => "INVALID_REQUEST",
            Error::Decode(_) => "DECODE_ERROR",
            Error::Conversion { .. } => "CONVERSION_ERROR",
            Error::TokenMissing { .. } | Error::TokenRefreshFailed(_) => "AUTH_EXPIRED",
            Error::Timeout { .. } => "TIMEOUT",
            Error::OAuth(_) | Error::Token(_) => "AUTH_ERROR",
            Error::Gmail { .. } | Error::GmailShape(_) | Error::Http(_) => "EMAIL_PROVIDER_ERROR",
            Error::DocumentStore(_) | Error::Mongo(_) => "DOCUMENT_STORE_ERROR",
            Error::SpreadsheetWrite(_) => "SPREADSHEET_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Returns a user-friendly action message for recoverable errors
    pub fn action_hint(&self) -> Option<&'static str> {
        match self {
            Error::TokenMissing { .. } | Error::TokenRefreshFailed(_) => {
                Some("Re-run the Gmail auth flow to refresh token.json")
            }
            Error::Timeout { .. } => Some("Check that the external service is reachable"),
            Error::ToolNotFound(_) => Some("Call tools/list for the available tool names"),
            _ => None,
        }
    }
}
