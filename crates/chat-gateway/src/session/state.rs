//! Session state
//!
//! Connection lifecycle states and the data a session carries between connections.

use crate::events::ReadyEvent;
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No driver running, or waiting to reconnect without a session
    #[default]
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify sent (or pending), waiting for READY
    Identifying,
    /// READY or RESUMED received
    Connected,
    /// Reconnecting with an existing session, waiting for RESUMED
    Resuming,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Connected => "connected",
            Self::Resuming => "resuming",
        }
    }

    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data that survives across connections of one logical session
///
/// Mutated only by the session driver.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Assigned by READY; required for resume
    pub session_id: Option<String>,
    /// Where resumes should connect, from READY
    pub resume_url: Option<String>,
    /// Consecutive backoff reconnects since the last READY/RESUMED
    pub reconnect_attempts: u32,
    /// No identify may be sent before this instant
    pub identify_not_before: Option<Instant>,
}

impl SessionData {
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn record_ready(&mut self, ready: &ReadyEvent) {
        self.session_id = Some(ready.session_id.clone());
        self.resume_url.clone_from(&ready.resume_gateway_url);
        self.reconnect_attempts = 0;
    }

    /// Drop the session so the next handshake is an identify
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.resume_url = None;
    }

    /// Back to a fresh logical client
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Earliest instant an identify may go out, never before `now`
    #[must_use]
    pub fn identify_deadline(&self, now: Instant) -> Instant {
        self.identify_not_before.map_or(now, |gate| gate.max(now))
    }
}
