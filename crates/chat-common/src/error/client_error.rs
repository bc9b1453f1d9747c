//! Client error types
//!
//! Unified error taxonomy for the gateway client and its collaborators.

use crate::config::ConfigError;
use std::fmt;
use std::time::Duration;

/// Client-wide error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    // Credentials and settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Socket errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Malformed or unexpected frames
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Gateway is not connected")]
    NotConnected,

    // Dispatch errors
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Handler for {name} failed: {message}")]
    HandlerInvocation { name: String, message: String },

    // Terminal errors
    #[error("Fatal close {code}: {message}")]
    Fatal { code: u16, message: String },

    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Get a stable error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::CommandNotFound(_) => "COMMAND_NOT_FOUND",
            Self::HandlerInvocation { .. } => "HANDLER_INVOCATION_ERROR",
            Self::Fatal { .. } => "FATAL_CLOSE",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if the session should reconnect after this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }

    /// Check if this error ends the session for good
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Fatal { .. } | Self::ReconnectExhausted { .. }
        )
    }

    /// Create a protocol error
    #[must_use]
    pub fn protocol(msg: impl fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(format!("{:#}", err.into()))
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
