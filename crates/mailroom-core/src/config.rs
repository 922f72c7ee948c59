//! Configuration management for Mailroom

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Gmail API settings
    #[serde(default)]
    pub gmail: GmailConfig,

    /// Document database settings
    #[serde(default)]
    pub mongodb: MongoConfig,

    /// Spreadsheet output settings
    #[serde(default)]
    pub spreadsheet: SpreadsheetConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (logs live under `<data_dir>/logs`)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// Gmail API and OAuth settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// OAuth client file (`installed` or `web` section). Ignored when
    /// `GOOGLE_CREDENTIALS_JSON` is set.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Stored token file produced by the local auth flow
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Redirect URI override; defaults to the first URI in the client file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Gmail user id, normally "me"
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Client-side request rate limit
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Per-request timeout for Gmail and token endpoint calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            redirect_uri: None,
            user_id: default_user_id(),
            requests_per_second: default_rate_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// MongoDB settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string
    #[serde(default = "default_mongo_uri")]
    pub uri: String,

    /// Database name
    #[serde(default = "default_mongo_database")]
    pub database: String,

    /// Upper bound on connecting and on each database operation
    #[serde(default = "default_mongo_timeout")]
    pub timeout_secs: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongo_uri(),
            database: default_mongo_database(),
            timeout_secs: default_mongo_timeout(),
        }
    }
}

/// Spreadsheet writer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    /// Directory relative filenames resolve against (working directory when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    get_data_dir()
}

fn default_credentials_path() -> PathBuf {
    get_config_dir().join("credentials.json")
}

fn default_token_path() -> PathBuf {
    get_config_dir().join("token.json")
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_rate_limit() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "mailroom".to_string()
}

fn default_mongo_timeout() -> u64 {
    30
}

/// Get the data directory (XDG: ~/.local/share/mailroom)
fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::APP_NAME)
}

/// Get the config directory (XDG: ~/.config/mailroom)
fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(crate::APP_NAME)
}

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        get_config_dir().join("config.toml")
    }

    /// Load configuration from the default path, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply the deployment environment variables on top of file settings.
    /// `GOOGLE_CREDENTIALS_JSON` is read by the OAuth layer directly.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = var("MONGODB_URI") {
            self.mongodb.uri = uri;
        }
        if let Some(db) = var("MONGODB_DATABASE") {
            self.mongodb.database = db;
        }
        if let Some(uri) = var("REDIRECT_URI") {
            self.gmail.redirect_uri = Some(uri);
        }
        if let Some(level) = var("MAILROOM_LOG_LEVEL") {
            self.general.log_level = level;
        }
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.general.data_dir.join("logs")
    }

    /// Resolve a spreadsheet filename against the configured output directory
    pub fn spreadsheet_path(&self, filename: &str) -> Result<PathBuf> {
        let base = match &self.spreadsheet.output_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(base.join(filename))
    }
}
