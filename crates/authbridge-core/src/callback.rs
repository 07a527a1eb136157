//! OAuth callback flow.
//!
//! Runs once per callback: fetch the provider session, exchange its token at
//! the backend, store the issued credentials, then navigate. Every failure
//! lands on the sign-in route with an OAuth failure flag; a missing session
//! lands there without one.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::api::{ApiError, ExchangeRequest, TokenExchange};
use crate::auth::{CredentialError, CredentialStore, IdentityProvider, SessionError, StoredCredentials};

/// Query appended to the sign-in route when the callback failed
const OAUTH_FAILURE_QUERY: &str = "error=oauth_failed";

/// Where the user is sent once the callback resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Dashboard,
    SignIn { oauth_failed: bool },
}

/// Route paths for each destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    pub dashboard: String,
    pub sign_in: String,
}

impl Routes {
    pub fn path(&self, destination: &Destination) -> String {
        match destination {
            Destination::Dashboard => self.dashboard.clone(),
            Destination::SignIn { oauth_failed: false } => self.sign_in.clone(),
            Destination::SignIn { oauth_failed: true } => {
                let separator = if self.sign_in.contains('?') { '&' } else { '?' };
                format!("{}{}{}", self.sign_in, separator, OAUTH_FAILURE_QUERY)
            }
        }
    }
}

/// Client-side navigation capability.
pub trait Navigator: Send {
    fn navigate(&mut self, path: &str);
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pub visited: Vec<String>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&str> {
        self.visited.last().map(String::as_str)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&mut self, path: &str) {
        self.visited.push(path.to_string());
    }
}

/// Final state of a callback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Authenticated,
    Unauthenticated,
    Failed,
}

impl Resolution {
    pub fn destination(&self) -> Destination {
        match self {
            Resolution::Authenticated => Destination::Dashboard,
            Resolution::Unauthenticated => Destination::SignIn { oauth_failed: false },
            Resolution::Failed => Destination::SignIn { oauth_failed: true },
        }
    }
}

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Failed to fetch provider session: {0}")]
    SessionFetch(#[from] SessionError),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Token exchange unreachable: {0}")]
    Network(#[source] ApiError),

    #[error("Failed to store credentials: {0}")]
    Storage(#[from] CredentialError),
}

impl CallbackError {
    /// Short label for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::SessionFetch(_) => "session_fetch",
            CallbackError::Exchange(_) => "exchange",
            CallbackError::Network(_) => "network",
            CallbackError::Storage(_) => "storage",
        }
    }
}

impl From<ApiError> for CallbackError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NetworkError(_) => CallbackError::Network(err),
            ApiError::Exchange(message) | ApiError::InvalidResponse(message) => {
                CallbackError::Exchange(message)
            }
        }
    }
}

/// Drives the identity provider, the token exchange and the credential
/// store in order.
pub struct CallbackHandler {
    provider: Arc<dyn IdentityProvider>,
    exchange: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore>,
    routes: Routes,
}

impl CallbackHandler {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        exchange: Arc<dyn TokenExchange>,
        store: Arc<dyn CredentialStore>,
        routes: Routes,
    ) -> Self {
        Self {
            provider,
            exchange,
            store,
            routes,
        }
    }

    /// Resolve the callback and navigate. Never fails: errors are logged and
    /// turned into a sign-in redirect carrying the failure flag.
    pub async fn run(&self, navigator: &mut dyn Navigator) -> Resolution {
        let resolution = match self.resolve().await {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(error = %e, kind = e.kind(), "OAuth callback failed");
                Resolution::Failed
            }
        };

        let path = self.routes.path(&resolution.destination());
        info!(?resolution, path = %path, "OAuth callback resolved");
        navigator.navigate(&path);
        resolution
    }

    async fn resolve(&self) -> Result<Resolution, CallbackError> {
        let session = match self.provider.get_session().await? {
            Some(session) => session,
            None => {
                info!("No provider session, redirecting to sign-in");
                return Ok(Resolution::Unauthenticated);
            }
        };

        let request = ExchangeRequest::new(session.access_token);
        let issued = self.exchange.exchange(&request).await?;

        StoredCredentials::from_issued(&issued)?.persist(self.store.as_ref())?;
        Ok(Resolution::Authenticated)
    }
}
