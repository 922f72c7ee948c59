//! Typed tool arguments
//!
//! Every tool deserializes its argument object into one of these structs.
//! Missing optional fields take the defaults advertised in the tool schemas;
//! a missing required field or a wrong type is an `InvalidArguments` error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::tools::ToolName;
use crate::error::{Error, Result};
use crate::services::JsonDocument;

pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_FIND_LIMIT: i64 = 10;
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_find_limit() -> i64 {
    DEFAULT_FIND_LIMIT
}

/// `limit` of zero, a negative number or null means the default; the
/// database would otherwise read zero as "no limit"
fn positive_limit<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let limit = Option::<f64>::deserialize(deserializer)?;
    Ok(limit
        .filter(|n| *n >= 1.0)
        .map(|n| n as i64)
        .unwrap_or(DEFAULT_FIND_LIMIT))
}

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEmailsArgs {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEmailArgs {
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailArgs {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAttachmentArgs {
    pub message_id: String,
    pub attachment_id: String,
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindDocumentsArgs {
    pub collection: String,
    #[serde(default)]
    pub filter: JsonDocument,
    #[serde(default = "default_find_limit", deserialize_with = "positive_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertDocumentArgs {
    pub collection: String,
    pub document: JsonDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDocumentsArgs {
    pub collection: String,
    pub filter: JsonDocument,
    pub update: JsonDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDocumentsArgs {
    pub collection: String,
    pub filter: JsonDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateArgs {
    pub collection: String,
    pub pipeline: Vec<JsonDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountDocumentsArgs {
    pub collection: String,
    #[serde(default)]
    pub filter: JsonDocument,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExcelSheetArgs {
    pub filename: String,
    pub data: Vec<JsonDocument>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

/// Deserialize a tool's argument object. An absent (`null`) argument value
/// is read as an empty object.
pub fn parse_args<T: DeserializeOwned>(tool: ToolName, arguments: &Value) -> Result<T> {
    let result = match arguments {
        Value::Null => T::deserialize(&Value::Object(Default::default())),
        other => T::deserialize(other),
    };
    result.map_err(|e| Error::InvalidArguments {
        tool: tool.as_str().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_when_absent() {
        let search: SearchEmailsArgs = parse_args(ToolName::SearchEmails, &json!({})).unwrap();
        assert_eq!(search.max_results, 5);
        assert!(search.query.is_none());

        let find: FindDocumentsArgs =
            parse_args(ToolName::FindDocuments, &json!({"collection": "orders"})).unwrap();
        assert!(find.filter.is_empty());
        assert_eq!(find.limit, 10);

        let sheet: CreateExcelSheetArgs = parse_args(
            ToolName::CreateExcelSheet,
            &json!({"filename": "r.xlsx", "data": []}),
        )
        .unwrap();
        assert_eq!(sheet.sheet_name, "Sheet1");

        let send: SendEmailArgs = parse_args(
            ToolName::SendEmail,
            &json!({"to": "a@b.c", "subject": "s", "body": "b"}),
        )
        .unwrap();
        assert!(!send.is_html);
    }

    #[test]
    fn test_non_positive_limit_uses_default() {
        for limit in [json!(0), json!(-3), json!(null), json!(0.5)] {
            let find: FindDocumentsArgs = parse_args(
                ToolName::FindDocuments,
                &json!({"collection": "orders", "limit": limit}),
            )
            .unwrap();
            assert_eq!(find.limit, DEFAULT_FIND_LIMIT, "limit {limit}");
        }

        let find: FindDocumentsArgs =
            parse_args(ToolName::FindDocuments, &json!({"collection": "orders", "limit": 25}))
                .unwrap();
        assert_eq!(find.limit, 25);
    }

    #[test]
    fn test_null_arguments_read_as_empty_object() {
        let search: SearchEmailsArgs = parse_args(ToolName::SearchEmails, &Value::Null).unwrap();
        assert_eq!(search.max_results, 5);
    }

    #[test]
    fn test_missing_required_field_names_it() {
        let err = parse_args::<GetAttachmentArgs>(
            ToolName::GetAttachment,
            &json!({"messageId": "m", "attachmentId": "a"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("get_attachment"));
        assert!(message.contains("mimeType"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = parse_args::<FindDocumentsArgs>(
            ToolName::FindDocuments,
            &json!({"collection": "orders", "filter": [1, 2]}),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }
}
