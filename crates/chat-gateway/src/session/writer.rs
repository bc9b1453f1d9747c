//! Outbound writer task
//!
//! The single serialization point for a connection: every frame reaches the
//! socket through here. Heartbeats and closes use a priority lane that skips
//! the send budget.

use super::TaskGuard;
use crate::protocol::{GatewayMessage, OpCode};
use crate::transport::{close_message, Message, WsSink};
use chat_common::ClientError;
use futures_util::SinkExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::sync::mpsc;

#[derive(Debug)]
pub(crate) enum WriterCommand {
    Frame(GatewayMessage),
    Close { code: u16, reason: String },
}

/// Cloneable handle for queueing frames on the current connection
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    priority: mpsc::UnboundedSender<WriterCommand>,
    frames: mpsc::UnboundedSender<GatewayMessage>,
}

impl Outbound {
    /// Queue a frame; heartbeats take the priority lane
    pub(crate) fn send(&self, frame: GatewayMessage) -> Result<(), ClientError> {
        let queued = if frame.op == OpCode::Heartbeat {
            self.priority.send(WriterCommand::Frame(frame)).is_ok()
        } else {
            self.frames.send(frame).is_ok()
        };
        if queued {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Ask the writer to send a close frame and stop
    pub(crate) fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.priority
            .send(WriterCommand::Close {
                code,
                reason: reason.into(),
            })
            .is_ok()
    }

    pub(crate) fn priority_lane(&self) -> mpsc::UnboundedSender<WriterCommand> {
        self.priority.clone()
    }
}

/// Spawn the writer for one connection
///
/// `budget` limits non-priority frames per minute; `None` disables the limit.
pub(crate) fn spawn_writer(sink: WsSink, budget: Option<NonZeroU32>) -> (Outbound, TaskGuard) {
    let (priority_tx, priority_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let limiter = budget.map(|per_minute| RateLimiter::direct(Quota::per_minute(per_minute)));

    let task = tokio::spawn(run_writer(sink, priority_rx, frames_rx, limiter));

    (
        Outbound {
            priority: priority_tx,
            frames: frames_tx,
        },
        TaskGuard::new(task),
    )
}

async fn run_writer(
    mut sink: WsSink,
    mut priority_rx: mpsc::UnboundedReceiver<WriterCommand>,
    mut frames_rx: mpsc::UnboundedReceiver<GatewayMessage>,
    limiter: Option<DefaultDirectRateLimiter>,
) {
    let mut pending: Option<GatewayMessage> = None;

    loop {
        let command = tokio::select! {
            biased;

            command = priority_rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
            () = wait_for_budget(limiter.as_ref()), if pending.is_some() => match pending.take() {
                Some(frame) => WriterCommand::Frame(frame),
                None => continue,
            },
            frame = frames_rx.recv(), if pending.is_none() => match frame {
                Some(frame) => {
                    pending = Some(frame);
                    continue;
                }
                None => break,
            },
        };

        match command {
            WriterCommand::Frame(frame) => {
                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(op = %frame.op, error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                tracing::trace!(op = %frame.op, "Sending frame");
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    tracing::warn!(error = %e, "Failed to write frame");
                    break;
                }
            }
            WriterCommand::Close { code, reason } => {
                tracing::debug!(close_code = code, reason = %reason, "Sending close frame");
                let _ = sink.send(close_message(code, reason)).await;
                break;
            }
        }
    }

    let _ = sink.close().await;
    tracing::debug!("Writer task exiting");
}

async fn wait_for_budget(limiter: Option<&DefaultDirectRateLimiter>) {
    if let Some(limiter) = limiter {
        limiter.until_ready().await;
    }
}
