//! OAuth 2.0 for the Gmail collaborator

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::GmailConfig;
use crate::error::{Error, Result};
use crate::token_provider::{StoredToken, TokenProvider};

/// Scopes requested by the local auth flow
pub const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
];

/// Environment variable holding the OAuth client JSON inline
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS_JSON";

/// Google authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Fallback when the client JSON lists no redirect URIs
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// OAuth client credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// `installed` / `web` section of a downloaded client JSON
#[derive(Debug, Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

impl GoogleCredentials {
    /// Load from `GOOGLE_CREDENTIALS_JSON`, else from the credentials file
    pub async fn load(config: &GmailConfig) -> Result<Self> {
        let raw = match std::env::var(CREDENTIALS_ENV) {
            Ok(inline) if !inline.trim().is_empty() => {
                debug!("Using OAuth client from {}", CREDENTIALS_ENV);
                inline
            }
            _ => tokio::fs::read_to_string(&config.credentials_path)
                .await
                .map_err(|e| {
                    Error::OAuth(format!(
                        "No {} set and cannot read {}: {}",
                        CREDENTIALS_ENV,
                        config.credentials_path.display(),
                        e
                    ))
                })?,
        };
        Self::from_json(&raw, config.redirect_uri.as_deref())
    }

    /// Parse a client JSON. An explicit redirect URI wins over the first one
    /// listed in the file.
    pub fn from_json(raw: &str, redirect_override: Option<&str>) -> Result<Self> {
        let file: ClientFile = serde_json::from_str(raw)
            .map_err(|e| Error::OAuth(format!("Invalid OAuth client JSON: {}", e)))?;
        let section = file.installed.or(file.web).ok_or_else(|| {
            Error::OAuth("OAuth client JSON has neither an 'installed' nor a 'web' section".into())
        })?;

        let redirect_uri = redirect_override
            .map(str::to_string)
            .or_else(|| section.redirect_uris.into_iter().next())
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            redirect_uri,
        })
    }
}

/// Response from Google token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Merge into a stored token, keeping the previous refresh token and
    /// extra fields when the endpoint omits them
    fn into_stored(self, previous: Option<StoredToken>) -> StoredToken {
        let expiry_date = chrono::Utc::now().timestamp_millis() + self.expires_in * 1000;
        let (old_refresh, old_scope, extra) = match previous {
            Some(p) => (p.refresh_token, p.scope, p.extra),
            None => (None, None, Default::default()),
        };
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(old_refresh),
            scope: self.scope.or(old_scope),
            token_type: self.token_type,
            expiry_date: Some(expiry_date),
            extra,
        }
    }
}

/// OAuth manager handling token refresh for the single Gmail account
pub struct OAuthManager {
    credentials: GoogleCredentials,
    client: Client,
    token_provider: Arc<dyn TokenProvider>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for OAuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthManager")
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthManager {
    pub fn new(
        credentials: GoogleCredentials,
        client: Client,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            credentials,
            client,
            token_provider,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Generate the OAuth authorization URL
    pub fn authorization_url(&self) -> Result<String> {
        let scopes = OAUTH_SCOPES.join(" ");
        let url = url::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scopes.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| Error::OAuth(format!("Cannot build authorization URL: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange an authorization code and persist the resulting token
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);
            return Err(Error::OAuth(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let token = response.json::<TokenResponse>().await?.into_stored(None);
        if token.refresh_token.is_none() {
            return Err(Error::OAuth("No refresh token in response".to_string()));
        }

        self.token_provider.store(&token).await?;
        info!("Stored new token at {}", self.token_provider.location());
        Ok(token)
    }

    /// Refresh the stored access token
    pub async fn refresh_token(&self, current: StoredToken) -> Result<StoredToken> {
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            Error::TokenRefreshFailed("stored token has no refresh_token".to_string())
        })?;

        debug!("Refreshing Gmail access token");

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed: {} - {}", status, body);
            return Err(Error::TokenRefreshFailed(format!("{} - {}", status, body)));
        }

        let token = response.json::<TokenResponse>().await?.into_stored(Some(current));
        self.token_provider.store(&token).await?;
        info!("Refreshed Gmail access token");

        Ok(token)
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn get_valid_token(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let token = self
            .token_provider
            .load()
            .await?
            .ok_or_else(|| Error::TokenMissing {
                path: self.token_provider.location(),
            })?;

        if token.is_expired() {
            info!("Gmail token expired, refreshing...");
            Ok(self.refresh_token(token).await?.access_token)
        } else {
            debug!("Gmail token still valid");
            Ok(token.access_token)
        }
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.token_provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_provider::FileTokenProvider;

    const CLIENT_JSON: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost:3000/oauth2callback", "urn:ietf:wg:oauth:2.0:oob"]
        }
    }"#;

    #[test]
    fn test_credentials_from_installed_section() {
        let creds = GoogleCredentials::from_json(CLIENT_JSON, None).unwrap();
        assert_eq!(creds.client_id, "123.apps.googleusercontent.com");
        assert_eq!(creds.redirect_uri, "http://localhost:3000/oauth2callback");
    }

    #[test]
    fn test_credentials_web_section_and_override() {
        let web = r#"{"web":{"client_id":"w","client_secret":"s"}}"#;
        let creds = GoogleCredentials::from_json(web, Some("https://mail.example.com/cb")).unwrap();
        assert_eq!(creds.client_id, "w");
        assert_eq!(creds.redirect_uri, "https://mail.example.com/cb");

        let bare = GoogleCredentials::from_json(web, None).unwrap();
        assert_eq!(bare.redirect_uri, DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn test_credentials_without_section() {
        let err = GoogleCredentials::from_json(r#"{"other":{}}"#, None).unwrap_err();
        assert!(matches!(err, Error::OAuth(_)));
    }

    #[test]
    fn test_refresh_keeps_refresh_token_and_extras() {
        let mut extra = serde_json::Map::new();
        extra.insert("id_token".into(), "abc".into());
        let previous = StoredToken {
            access_token: "old".into(),
            refresh_token: Some("1//keep".into()),
            scope: Some("scope-a".into()),
            token_type: Some("Bearer".into()),
            expiry_date: Some(0),
            extra,
        };
        let response = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: 3599,
            token_type: Some("Bearer".into()),
            scope: None,
        };

        let merged = response.into_stored(Some(previous));
        assert_eq!(merged.access_token, "new");
        assert_eq!(merged.refresh_token.as_deref(), Some("1//keep"));
        assert_eq!(merged.scope.as_deref(), Some("scope-a"));
        assert_eq!(merged.extra["id_token"], "abc");
        assert!(!merged.is_expired());
    }

    #[test]
    fn test_authorization_url_carries_scopes() {
        let creds = GoogleCredentials::from_json(CLIENT_JSON, None).unwrap();
        let manager = OAuthManager::new(
            creds,
            Client::new(),
            Arc::new(FileTokenProvider::new("/nonexistent/token.json")),
        );
        let url = url::Url::parse(&manager.authorization_url().unwrap()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["access_type"], "offline");
        assert!(pairs["scope"].contains("gmail.send"));
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/oauth2callback");
    }

    #[tokio::test]
    async fn test_missing_token_asks_for_auth_flow() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OAuthManager::new(
            GoogleCredentials::from_json(CLIENT_JSON, None).unwrap(),
            Client::new(),
            Arc::new(FileTokenProvider::new(dir.path().join("token.json"))),
        );
        let err = manager.get_valid_token().await.unwrap_err();
        assert!(err.requires_reauth());
        assert!(err.to_string().contains("token.json"));
    }
}
