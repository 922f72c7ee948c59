//! Gmail REST collaborator
//!
//! Talks to `gmail.googleapis.com` with a bearer token from the OAuth
//! manager. The manager itself is created on first use, so a server with no
//! Gmail credentials still starts and serves the other tools.

mod message;
mod rate_limiter;

pub use message::{build_raw_message, encode_raw_message};
pub use rate_limiter::GmailRateLimiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::GmailConfig;
use crate::error::{Error, Result};
use crate::oauth::{GoogleCredentials, OAuthManager};
use crate::services::{EmailProvider, MessageStub, OutgoingEmail};
use crate::token_provider::{FileTokenProvider, TokenProvider};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Gmail API client implementing [`EmailProvider`]
pub struct GmailClient {
    config: GmailConfig,
    http: Client,
    token_provider: Arc<dyn TokenProvider>,
    oauth: OnceCell<OAuthManager>,
    limiter: GmailRateLimiter,
}

impl GmailClient {
    /// Build a client using `token.json` at the configured path
    pub fn new(config: GmailConfig) -> Result<Self> {
        let token_provider = Arc::new(FileTokenProvider::new(config.token_path.clone()));
        Self::with_token_provider(config, token_provider)
    }

    pub fn with_token_provider(
        config: GmailConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let limiter = GmailRateLimiter::new(config.requests_per_second);

        Ok(Self {
            config,
            http,
            token_provider,
            oauth: OnceCell::new(),
            limiter,
        })
    }

    /// OAuth manager, loading client credentials on first call
    pub async fn oauth(&self) -> Result<&OAuthManager> {
        self.oauth
            .get_or_try_init(|| async {
                let credentials = GoogleCredentials::load(&self.config).await?;
                info!("Loaded Gmail OAuth client {}", credentials.client_id);
                Ok::<_, Error>(OAuthManager::new(
                    credentials,
                    self.http.clone(),
                    self.token_provider.clone(),
                ))
            })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", API_BASE, self.config.user_id, path)
    }

    /// Send an authorized, rate-limited request and decode a JSON body
    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let token = self.oauth().await?.get_valid_token().await?;
        self.limiter.wait().await;

        let started = std::time::Instant::now();
        let response = request.bearer_auth(token).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    operation: format!("gmail {}", operation),
                    secs: self.config.request_timeout_secs,
                }
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status();
        debug!(
            "gmail {} -> {} ({}ms)",
            operation,
            status,
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gmail {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::GmailShape(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl EmailProvider for GmailClient {
    async fn search_messages(
        &self,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<MessageStub>> {
        let mut params = vec![("maxResults", max_results.to_string())];
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            params.push(("q", q.to_string()));
        }

        let request = self.http.get(self.url("messages")).query(&params);
        let response: ListMessagesResponse = self.execute("messages.list", request).await?;
        debug!("Search matched {} messages", response.messages.len());
        Ok(response.messages)
    }

    async fn get_message(&self, message_id: &str) -> Result<Value> {
        let request = self.http.get(self.url(&format!("messages/{}", message_id)));
        self.execute("messages.get", request).await
    }

    async fn send_message(&self, email: &OutgoingEmail) -> Result<String> {
        let raw = encode_raw_message(email);
        let request = self
            .http
            .post(self.url("messages/send"))
            .json(&serde_json::json!({ "raw": raw }));

        let response: SendResponse = self.execute("messages.send", request).await?;
        info!("Email sent: {}", response.id);
        Ok(response.id)
    }

    async fn fetch_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        let request = self.http.get(self.url(&format!(
            "messages/{}/attachments/{}",
            message_id, attachment_id
        )));
        let body: AttachmentBody = self.execute("attachments.get", request).await?;
        body.data.ok_or_else(|| {
            Error::GmailShape(format!(
                "attachment {} of message {} has no data",
                attachment_id, message_id
            ))
        })
    }
}
