//! Heartbeat scheduler
//!
//! Sends `{op:1, d:<seq>}` on its own timer and watches for the matching ack.
//! A tick that finds the previous heartbeat still unacknowledged reports
//! [`HeartbeatEvent::Zombied`] once and stops.

use super::writer::WriterCommand;
use super::{SequenceTracker, TaskGuard};
use crate::protocol::GatewayMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Reported to the session driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// The last heartbeat was never acknowledged
    Zombied,
}

/// Heartbeat bookkeeping shared with the session handle
#[derive(Debug, Default)]
pub struct HeartbeatStats {
    ack_pending: AtomicBool,
    last_sent: Mutex<Option<Instant>>,
    latency: Mutex<Option<Duration>>,
}

impl HeartbeatStats {
    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }

    pub fn is_ack_pending(&self) -> bool {
        self.ack_pending.load(Ordering::Acquire)
    }

    pub fn last_sent(&self) -> Option<Instant> {
        *self.last_sent.lock()
    }

    fn record_sent(&self) {
        *self.last_sent.lock() = Some(Instant::now());
        self.ack_pending.store(true, Ordering::Release);
    }

    fn record_ack(&self) -> Option<Duration> {
        self.ack_pending.store(false, Ordering::Release);
        let latency = self.last_sent.lock().map(|sent| sent.elapsed());
        if latency.is_some() {
            *self.latency.lock() = latency;
        }
        latency
    }

    /// Clear per-connection state; latency is kept for display
    fn begin_connection(&self) {
        self.ack_pending.store(false, Ordering::Release);
        *self.last_sent.lock() = None;
    }
}

/// Runs the heartbeat timer for one connection
///
/// Dropping the scheduler aborts its task.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    interval: Duration,
    stats: Arc<HeartbeatStats>,
    sequence: Arc<SequenceTracker>,
    lane: mpsc::UnboundedSender<WriterCommand>,
    _task: TaskGuard,
}

impl HeartbeatScheduler {
    /// Start beating; the first heartbeat waits `interval * random[0, 1)`
    pub(crate) fn start(
        interval: Duration,
        sequence: Arc<SequenceTracker>,
        stats: Arc<HeartbeatStats>,
        lane: mpsc::UnboundedSender<WriterCommand>,
        events: mpsc::UnboundedSender<HeartbeatEvent>,
    ) -> Self {
        stats.begin_connection();
        let first_delay = interval.mul_f64(rand::random::<f64>());

        let task = tokio::spawn(run_heartbeat(
            interval,
            first_delay,
            Arc::clone(&stats),
            Arc::clone(&sequence),
            lane.clone(),
            events,
        ));

        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            first_delay_ms = first_delay.as_millis() as u64,
            "Heartbeat started"
        );

        Self {
            interval,
            stats,
            sequence,
            lane,
            _task: TaskGuard::new(task),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Send a heartbeat immediately (server asked for one)
    pub fn beat_now(&self) -> bool {
        send_heartbeat(&self.stats, &self.sequence, &self.lane)
    }

    /// Record a heartbeat ack, returning the measured latency
    pub fn acknowledge(&self) -> Option<Duration> {
        self.stats.record_ack()
    }
}

fn send_heartbeat(
    stats: &HeartbeatStats,
    sequence: &SequenceTracker,
    lane: &mpsc::UnboundedSender<WriterCommand>,
) -> bool {
    let seq = sequence.get();
    if lane
        .send(WriterCommand::Frame(GatewayMessage::heartbeat(seq)))
        .is_err()
    {
        return false;
    }
    stats.record_sent();
    tracing::trace!(seq = ?seq, "Heartbeat sent");
    true
}

async fn run_heartbeat(
    interval: Duration,
    first_delay: Duration,
    stats: Arc<HeartbeatStats>,
    sequence: Arc<SequenceTracker>,
    lane: mpsc::UnboundedSender<WriterCommand>,
    events: mpsc::UnboundedSender<HeartbeatEvent>,
) {
    tokio::time::sleep(first_delay).await;

    // First tick completes immediately, right after the jittered delay
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if stats.is_ack_pending() {
            tracing::warn!(
                interval_ms = interval.as_millis() as u64,
                "Heartbeat not acknowledged, connection zombied"
            );
            let _ = events.send(HeartbeatEvent::Zombied);
            return;
        }

        if !send_heartbeat(&stats, &sequence, &lane) {
            tracing::debug!("Writer closed, heartbeat task exiting");
            return;
        }
    }
}
