//! Dispatch error types
//!
//! These stay inside the dispatch layer: they are logged where they happen
//! and never reach the session driver.

use chat_common::ClientError;
use thiserror::Error;

/// Dispatch error type
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Payload did not match the handler's parameter shape
    #[error("Failed to decode {event} payload as {shape}: {source}")]
    Decode {
        event: String,
        shape: String,
        #[source]
        source: serde_json::Error,
    },

    /// Handler returned an error
    #[error("Handler {owner} for {name} failed: {message}")]
    HandlerFailed {
        name: String,
        owner: &'static str,
        message: String,
    },

    /// Handler panicked
    #[error("Handler {owner} for {name} panicked: {message}")]
    HandlerPanicked {
        name: String,
        owner: &'static str,
        message: String,
    },

    /// No binding for a command name
    #[error("Command not found: {0}")]
    CommandNotFound(String),
}

impl DispatchError {
    /// Map onto the client taxonomy for logging
    #[must_use]
    pub fn to_client_error(&self) -> ClientError {
        match self {
            Self::Decode { .. } => ClientError::protocol(self),
            Self::HandlerFailed { name, message, .. } | Self::HandlerPanicked { name, message, .. } => {
                ClientError::HandlerInvocation {
                    name: name.clone(),
                    message: message.clone(),
                }
            }
            Self::CommandNotFound(name) => ClientError::CommandNotFound(name.clone()),
        }
    }

    /// Stable code for log fields
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        self.to_client_error().error_code()
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
