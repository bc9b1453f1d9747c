//! Voice connection close codes
//!
//! Kept apart from the gateway table: several numbers overlap with different meanings.

use super::close_codes::{lookup, CloseClassification, CloseCodeClassifier, CloseEntry, CloseKind};

const fn voice(code: u16, kind: CloseKind, message: &'static str) -> CloseEntry {
    CloseEntry {
        code,
        kind,
        invalidates_session: false,
        message,
    }
}

const VOICE_TABLE: &[CloseEntry] = &[
    voice(4001, CloseKind::Resumable, "Unknown voice opcode"),
    voice(4002, CloseKind::Resumable, "Failed to decode voice payload"),
    voice(4003, CloseKind::Fatal, "Voice session not authenticated"),
    voice(4004, CloseKind::Fatal, "Voice authentication failed"),
    voice(4005, CloseKind::Resumable, "Voice session already authenticated"),
    voice(4006, CloseKind::Fatal, "Voice session no longer valid"),
    voice(4009, CloseKind::Resumable, "Voice session timed out"),
    voice(4011, CloseKind::Fatal, "Voice server not found"),
    voice(4012, CloseKind::Fatal, "Unknown voice protocol"),
    voice(4014, CloseKind::Fatal, "Disconnected from voice channel"),
    voice(4015, CloseKind::Resumable, "Voice server crashed"),
    voice(4016, CloseKind::Fatal, "Unknown encryption mode"),
];

/// Classifier for voice connections
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceCloseCodes;

impl CloseCodeClassifier for VoiceCloseCodes {
    fn classify(&self, code: u16) -> CloseClassification {
        lookup(VOICE_TABLE, code)
    }
}
