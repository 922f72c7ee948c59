//! File-based token provider
//!
//! Reads and writes `token.json` at the configured path, caching the parsed
//! token in memory after the first read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{StoredToken, TokenProvider};
use crate::error::{Error, Result};

pub struct FileTokenProvider {
    path: PathBuf,
    cache: Mutex<Option<StoredToken>>,
}

impl FileTokenProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn load(&self) -> Result<Option<StoredToken>> {
        let cached = self.cache.lock().clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Token file does not exist: {:?}", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Token(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let token: StoredToken = serde_json::from_str(&contents).map_err(|e| {
            Error::Token(format!("Invalid token file {}: {}", self.path.display(), e))
        })?;

        *self.cache.lock() = Some(token.clone());
        Ok(Some(token))
    }

    async fn store(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, contents).await.map_err(|e| {
            Error::Token(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        *self.cache.lock() = Some(token.clone());
        debug!("Stored token at {:?}", self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
