//! Wire types: JSON-RPC 2.0 framing plus the MCP tool and content shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request (a notification when `id` is absent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response; exactly one of `result` and `error` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Entry in the `tools/list` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Embedded resource payload (binary data travels in `blob`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Result envelope of every tool call. `is_error` is set exactly when the
/// handler failed, in which case `content` is a single text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// One content block of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolResultContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(rename = "resource")]
    Resource { resource: ResourceContent },
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolResultContent::Text { text: text.into() }
    }

    /// Text of a text block, `None` for other kinds
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolResultContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl ToolResult {
    /// Single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self::blocks(vec![ToolResultContent::text(text)])
    }

    /// Failed call carrying the error message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(message)],
            is_error: true,
        }
    }

    /// Pretty-printed JSON in a single text block
    pub fn json(value: &Value) -> Self {
        Self::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
    }

    /// Successful result from prepared content blocks
    pub fn blocks(content: Vec<ToolResultContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Concatenated text of all text blocks
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ToolResultContent::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_shape() {
        let ok = serde_json::to_value(ToolResult::text("done")).unwrap();
        assert_eq!(
            ok,
            json!({"content": [{"type": "text", "text": "done"}], "isError": false})
        );

        let err = serde_json::to_value(ToolResult::error("Tool not found: nope")).unwrap();
        assert_eq!(err["isError"], json!(true));
        assert_eq!(err["content"][0]["text"], json!("Tool not found: nope"));
    }

    #[test]
    fn test_content_block_tags() {
        let image = serde_json::to_value(ToolResultContent::Image {
            data: "iVBORw0KGgo=".into(),
            mime_type: "image/png".into(),
        })
        .unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["mimeType"], "image/png");

        let resource = serde_json::to_value(ToolResultContent::Resource {
            resource: ResourceContent {
                uri: "email://m/attachments/a".into(),
                mime_type: Some("application/pdf".into()),
                text: None,
                blob: Some("JVBERg==".into()),
            },
        })
        .unwrap();
        assert_eq!(resource["type"], "resource");
        assert_eq!(resource["resource"]["mimeType"], "application/pdf");
        assert!(resource["resource"].get("text").is_none());
    }

    #[test]
    fn test_notification_detection() {
        let note: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(note.is_notification());

        let call: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert!(!call.is_notification());
    }
}
