//! API client for the application backend's token exchange endpoint.
//!
//! The backend accepts an access token issued by the identity provider and
//! answers with its own access, refresh and session tokens plus the user
//! record.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the exchange endpoint, relative to the configured base URL
const EXCHANGE_PATH: &str = "/auth/oauth/exchange";

/// HTTP request timeout in seconds.
/// Bounds the callback page's loading state when the backend hangs.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Body sent to the exchange endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    pub access_token: String,
}

impl ExchangeRequest {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

/// Credentials issued by the backend on a successful exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub session_token: String,
    /// Opaque user record, stored verbatim as JSON text
    pub user: serde_json::Value,
}

/// Trades an identity provider token for application credentials.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<IssuedCredentials, ApiError>;
}

/// API client for the application backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for the given backend base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of the exchange endpoint
    pub fn exchange_url(&self) -> String {
        format!("{}{}", self.base_url, EXCHANGE_PATH)
    }
}

#[async_trait]
impl TokenExchange for ApiClient {
    async fn exchange(&self, request: &ExchangeRequest) -> Result<IssuedCredentials, ApiError> {
        let url = self.exchange_url();
        debug!(url = %url, "Exchanging provider token");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            warn!(%status, error = %err, "Token exchange rejected");
            return Err(err);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse exchange response: {}", e))
        })
    }
}
