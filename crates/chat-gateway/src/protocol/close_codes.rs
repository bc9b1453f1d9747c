//! Close-code classification
//!
//! Each connection type has its own table; both share [`CloseKind`] and the
//! [`CloseCodeClassifier`] trait.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the session should do after a close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseKind {
    /// Reconnect with backoff, resuming if a session exists
    Resumable,
    /// Stop for good
    Fatal,
    /// Wait out the server's retry-after, then identify
    RateLimited,
}

/// Result of classifying a close code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseClassification {
    pub code: u16,
    pub kind: CloseKind,
    pub message: &'static str,
    /// The next handshake must be a fresh identify
    pub invalidates_session: bool,
}

impl CloseClassification {
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind, CloseKind::Fatal)
    }

    const fn unknown(code: u16) -> Self {
        Self {
            code,
            kind: CloseKind::Resumable,
            message: UNKNOWN_CLOSE_MESSAGE,
            invalidates_session: false,
        }
    }
}

impl fmt::Display for CloseClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.code, self.kind, self.message)
    }
}

/// Maps a close code to a [`CloseClassification`]
///
/// Codes missing from a table are resumable with [`UNKNOWN_CLOSE_MESSAGE`].
pub trait CloseCodeClassifier {
    fn classify(&self, code: u16) -> CloseClassification;
}

pub const UNKNOWN_CLOSE_MESSAGE: &str = "Unknown close code";

/// One row of a close-code table
#[derive(Debug, Clone, Copy)]
pub(crate) struct CloseEntry {
    pub code: u16,
    pub kind: CloseKind,
    pub invalidates_session: bool,
    pub message: &'static str,
}

const fn entry(code: u16, kind: CloseKind, message: &'static str) -> CloseEntry {
    CloseEntry {
        code,
        kind,
        invalidates_session: false,
        message,
    }
}

const fn invalidating(code: u16, kind: CloseKind, message: &'static str) -> CloseEntry {
    CloseEntry {
        code,
        kind,
        invalidates_session: true,
        message,
    }
}

pub(crate) fn lookup(table: &[CloseEntry], code: u16) -> CloseClassification {
    table
        .iter()
        .find(|row| row.code == code)
        .map_or(CloseClassification::unknown(code), |row| CloseClassification {
            code,
            kind: row.kind,
            message: row.message,
            invalidates_session: row.invalidates_session,
        })
}

use CloseKind::{Fatal, RateLimited, Resumable};

const GATEWAY_TABLE: &[CloseEntry] = &[
    entry(4000, Resumable, "Unknown error"),
    entry(4001, Resumable, "Unknown opcode"),
    entry(4002, Resumable, "Decode error"),
    entry(4003, Resumable, "Not authenticated"),
    entry(4004, Fatal, "Authentication failed"),
    entry(4005, Resumable, "Already authenticated"),
    invalidating(4007, Resumable, "Invalid resume sequence"),
    invalidating(4008, RateLimited, "Rate limited"),
    invalidating(4009, Resumable, "Session timed out"),
    entry(4010, Fatal, "Invalid shard"),
    entry(4011, Fatal, "Sharding required"),
    entry(4012, Fatal, "Invalid API version"),
    entry(4013, Fatal, "Invalid intents"),
    entry(4014, Fatal, "Disallowed intents"),
];

/// Classifier for the main gateway connection
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayCloseCodes;

impl CloseCodeClassifier for GatewayCloseCodes {
    fn classify(&self, code: u16) -> CloseClassification {
        lookup(GATEWAY_TABLE, code)
    }
}
