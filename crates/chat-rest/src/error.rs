//! REST error types

use chat_common::ClientError;
use std::time::Duration;
use thiserror::Error;

/// REST error type
#[derive(Debug, Error)]
pub enum RestError {
    /// Connection, TLS, or timeout failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status other than 429
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// 429 Too Many Requests
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Response body did not match the expected type
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Bad client setup (empty token, invalid URL)
    #[error("Invalid REST configuration: {0}")]
    Configuration(String),
}

impl RestError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<RestError> for ClientError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::RateLimited { retry_after } => ClientError::RateLimited { retry_after },
            RestError::Configuration(msg) => ClientError::Configuration(msg),
            RestError::Decode(e) => ClientError::from(e),
            RestError::Status { status: 401, body } => ClientError::Configuration(format!("unauthorized: {body}")),
            other => ClientError::transport(other),
        }
    }
}

/// Result type alias for REST calls
pub type RestResult<T> = Result<T, RestError>;
