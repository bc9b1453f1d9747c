//! Last-seen dispatch sequence number

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks the highest sequence number seen on the current session
///
/// `0` is reserved for "nothing seen yet"; the gateway numbers dispatches from 1.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    value: AtomicU64,
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence from an inbound frame, returning the tracked value
    ///
    /// Lower or repeated values never move the tracker backwards.
    pub fn observe(&self, seq: u64) -> u64 {
        let previous = self.value.fetch_max(seq, Ordering::AcqRel);
        previous.max(seq)
    }

    /// Current sequence, if any dispatch has been seen
    #[must_use]
    pub fn get(&self) -> Option<u64> {
        match self.value.load(Ordering::Acquire) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Forget the sequence (new session)
    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}
