use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Provider session file name in cache directory
const SESSION_FILE: &str = "provider_session.json";

/// A signed-in session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() > at).unwrap_or(false)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Failed to read provider session: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse provider session: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The "get current session" capability of an identity provider.
///
/// `Ok(None)` means nobody is signed in, which is not an error.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, SessionError>;
}

/// Reads the provider session persisted by the identity SDK in the cache
/// directory. Expired sessions are reported as absent.
pub struct FileSessionProvider {
    cache_dir: PathBuf,
}

impl FileSessionProvider {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Save a provider session to disk
    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Remove the provider session from disk
    pub async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.session_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[async_trait]
impl IdentityProvider for FileSessionProvider {
    async fn get_session(&self) -> Result<Option<Session>, SessionError> {
        let path = self.session_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(?path, "No provider session file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&contents)?;

        if session.is_expired() {
            debug!(expires_at = ?session.expires_at, "Provider session expired");
            return Ok(None);
        }
        Ok(Some(session))
    }
}

/// Answers every session query with the same outcome.
pub struct StaticSessionProvider {
    outcome: Result<Option<Session>, String>,
}

impl StaticSessionProvider {
    pub fn signed_in(access_token: impl Into<String>) -> Self {
        Self {
            outcome: Ok(Some(Session::new(access_token))),
        }
    }

    pub fn signed_out() -> Self {
        Self { outcome: Ok(None) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticSessionProvider {
    async fn get_session(&self) -> Result<Option<Session>, SessionError> {
        self.outcome.clone().map_err(SessionError::Provider)
    }
}
