//! Gateway session
//!
//! Connection lifecycle, heartbeating, and the resume/reconnect policy.

mod backoff;
mod driver;
mod gateway;
mod heartbeat;
mod sequence;
mod state;
mod writer;

pub use backoff::ExponentialBackoff;
pub use gateway::GatewaySession;
pub use heartbeat::{HeartbeatEvent, HeartbeatScheduler, HeartbeatStats};
pub use sequence::SequenceTracker;
pub use state::{SessionData, SessionState};

use std::time::Duration;
use tokio::task::JoinHandle;

/// Aborts the wrapped task when dropped
#[derive(Debug)]
pub(crate) struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }

    /// Wait for the task to finish on its own, returning false on timeout
    pub(crate) async fn join_timeout(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, &mut self.0).await.is_ok()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
