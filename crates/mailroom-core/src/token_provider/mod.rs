//! OAuth token storage
//!
//! The Gmail collaborator authenticates with a single stored token in the
//! layout Google's client libraries write to `token.json`:
//!
//! ```json
//! {
//!   "access_token": "ya29...",
//!   "refresh_token": "1//0g...",
//!   "scope": "https://www.googleapis.com/auth/gmail.modify",
//!   "token_type": "Bearer",
//!   "expiry_date": 1760000000000
//! }
//! ```

mod file;

pub use file::FileTokenProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Seconds before expiry at which a token is treated as expired
const EXPIRY_GRACE_SECS: i64 = 300;

/// Stored OAuth token. Unknown fields are kept so a round trip through
/// refresh does not drop anything the auth flow wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// Check if the access token is expired or will expire soon
    pub fn is_expired(&self) -> bool {
        match self.expiry_date {
            Some(expiry_ms) => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                expiry_ms < now_ms + EXPIRY_GRACE_SECS * 1000
            }
            None => self.access_token.is_empty(),
        }
    }
}

/// Backend holding the single Gmail token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Load the stored token, `None` when the auth flow has not run yet
    async fn load(&self) -> Result<Option<StoredToken>>;

    /// Persist a (refreshed) token
    async fn store(&self, token: &StoredToken) -> Result<()>;

    /// Human-readable location, used in error messages
    fn location(&self) -> String;
}
