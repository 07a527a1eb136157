use serde::Deserialize;
use thiserror::Error;

/// Message used when the backend rejects an exchange without saying why.
pub const GENERIC_EXCHANGE_ERROR: &str = "Token exchange failed";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Token exchange rejected: {0}")]
    Exchange(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an error from a non-success exchange response.
    ///
    /// Uses the `error` field of a JSON body when the server supplied one,
    /// otherwise the generic exchange message.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty());

        match message {
            Some(message) => ApiError::Exchange(Self::truncate_body(&message)),
            None => {
                tracing::debug!(%status, body = %Self::truncate_body(body), "Exchange failed without error message");
                ApiError::Exchange(GENERIC_EXCHANGE_ERROR.to_string())
            }
        }
    }

    /// True when the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}
