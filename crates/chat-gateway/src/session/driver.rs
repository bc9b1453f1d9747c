//! Session driver
//!
//! Runs one connection at a time: connect, hello, identify or resume, then
//! read frames until the connection ends. Decides what happens next from
//! how it ended.

use super::heartbeat::{HeartbeatEvent, HeartbeatScheduler, HeartbeatStats};
use super::writer::{spawn_writer, Outbound};
use super::{ExponentialBackoff, SequenceTracker, SessionData, SessionState};
use crate::config::GatewayConfig;
use crate::events::{GatewayEventType, ReadyEvent};
use crate::protocol::{
    CloseCodeClassifier, CloseKind, GatewayCloseCodes, GatewayMessage, IdentifyPayload, OpCode, ResumePayload,
};
use crate::transport::{Connector, Message};
use chat_common::{ClientError, ClientResult};
use chat_core::Intents;
use futures_util::StreamExt;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep};

/// Close code used when no close frame was received
const NO_STATUS_CODE: u16 = 1005;

/// State shared between the driver and the [`GatewaySession`](super::GatewaySession) handle
pub(crate) struct SessionShared {
    pub(crate) config: GatewayConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) data: RwLock<SessionData>,
    pub(crate) sequence: Arc<SequenceTracker>,
    pub(crate) heartbeat: Arc<HeartbeatStats>,
    /// Writer handle of the live connection
    pub(crate) outbound: RwLock<Option<Outbound>>,
    /// Terminal result of the last driver run
    pub(crate) outcome: watch::Sender<Option<ClientResult<()>>>,
}

impl SessionShared {
    pub(crate) fn new(config: GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            state: watch::Sender::new(SessionState::Disconnected),
            data: RwLock::new(SessionData::default()),
            sequence: Arc::new(SequenceTracker::new()),
            heartbeat: Arc::new(HeartbeatStats::default()),
            outbound: RwLock::new(None),
            outcome: watch::Sender::new(None),
        }
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    /// Forget the session entirely
    pub(crate) fn reset(&self) {
        self.data.write().reset();
        self.sequence.reset();
        *self.outbound.write() = None;
        self.set_state(SessionState::Disconnected);
    }

    fn invalidate(&self) {
        self.data.write().invalidate();
        self.sequence.reset();
    }
}

/// One dispatch frame queued for the dispatch worker
#[derive(Debug)]
pub(crate) struct DispatchJob {
    pub(crate) event: String,
    pub(crate) payload: Value,
    pub(crate) sequence: Option<u64>,
}

/// How a connection ended
#[derive(Debug)]
enum ConnectionEnd {
    /// `stop` was called
    Shutdown,
    /// The server sent a close frame
    Closed { code: u16, reason: String },
    /// Connect failed, the stream errored, or it ended without a close frame
    Dropped(String),
    /// The server asked for a reconnect (op 7)
    Reconnect,
    /// A heartbeat went unacknowledged
    Zombied,
}

/// Per-connection resources, dropped when the connection ends
struct Connection {
    outbound: Outbound,
    heartbeat: Option<HeartbeatScheduler>,
    handshake: Option<Pin<Box<Sleep>>>,
    events_tx: mpsc::UnboundedSender<HeartbeatEvent>,
}

pub(crate) struct Driver {
    shared: Arc<SessionShared>,
    token: String,
    intents: Intents,
    backoff: ExponentialBackoff,
    shutdown: watch::Receiver<bool>,
    dispatch_tx: mpsc::UnboundedSender<DispatchJob>,
}

impl Driver {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        token: String,
        intents: Intents,
        shutdown: watch::Receiver<bool>,
        dispatch_tx: mpsc::UnboundedSender<DispatchJob>,
    ) -> Self {
        let config = &shared.config;
        let backoff = ExponentialBackoff::new(
            config.reconnect_base,
            config.reconnect_max,
            config.max_reconnect_attempts,
        );
        Self {
            shared,
            token,
            intents,
            backoff,
            shutdown,
            dispatch_tx,
        }
    }

    /// Connect and reconnect until stopped or a terminal error
    pub(crate) async fn run(mut self) -> ClientResult<()> {
        loop {
            let end = self.run_connection().await;

            let delay = match end {
                ConnectionEnd::Shutdown => return Ok(()),
                ConnectionEnd::Reconnect => Ok(Duration::ZERO),
                ConnectionEnd::Zombied => self.backoff_delay(),
                ConnectionEnd::Dropped(reason) => {
                    tracing::warn!(reason = %reason, "Gateway connection lost");
                    self.backoff_delay()
                }
                ConnectionEnd::Closed { code, reason } => self.after_close(code, &reason),
            };

            let delay = match delay {
                Ok(delay) => delay,
                Err(err) => {
                    self.shared.reset();
                    return Err(err);
                }
            };

            let waiting = if self.shared.data.read().can_resume() {
                SessionState::Resuming
            } else {
                SessionState::Disconnected
            };
            self.shared.set_state(waiting);

            if !delay.is_zero() {
                tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            }
            if !self.wait(delay).await {
                return Ok(());
            }
        }
    }

    /// Sleep unless shutdown is requested first; false means shut down
    async fn wait(&mut self, delay: Duration) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            biased;
            () = shutdown_requested(&mut self.shutdown) => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn backoff_delay(&self) -> ClientResult<Duration> {
        let mut data = self.shared.data.write();
        let attempt = data.reconnect_attempts;
        if let Some(delay) = self.backoff.next_delay(attempt) {
            data.reconnect_attempts += 1;
            Ok(delay)
        } else {
            tracing::error!(attempts = attempt, "Reconnect attempts exhausted");
            Err(ClientError::ReconnectExhausted { attempts: attempt })
        }
    }

    fn after_close(&self, code: u16, reason: &str) -> ClientResult<Duration> {
        let classification = GatewayCloseCodes.classify(code);

        match classification.kind {
            CloseKind::Fatal => {
                tracing::error!(
                    close_code = code,
                    reason = %reason,
                    "Gateway closed with fatal code: {}",
                    classification.message
                );
                Err(ClientError::Fatal {
                    code,
                    message: classification.message.to_string(),
                })
            }
            CloseKind::RateLimited => {
                let retry_after = parse_retry_after(reason).unwrap_or(self.shared.config.default_retry_after);
                tracing::warn!(
                    close_code = code,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Gateway rate limited the session"
                );
                self.shared.invalidate();
                self.shared.data.write().identify_not_before = Some(Instant::now() + retry_after);
                Ok(retry_after)
            }
            CloseKind::Resumable => {
                tracing::warn!(
                    close_code = code,
                    reason = %reason,
                    invalidates_session = classification.invalidates_session,
                    "Gateway closed: {}",
                    classification.message
                );
                if classification.invalidates_session {
                    self.shared.invalidate();
                }
                self.backoff_delay()
            }
        }
    }

    async fn run_connection(&mut self) -> ConnectionEnd {
        let (resuming, base) = {
            let data = self.shared.data.read();
            let base = match (&data.session_id, &data.resume_url) {
                (Some(_), Some(url)) => url.clone(),
                _ => self.shared.config.gateway_url.clone(),
            };
            (data.can_resume(), base)
        };
        self.shared.set_state(if resuming {
            SessionState::Resuming
        } else {
            SessionState::Connecting
        });

        let url = self.shared.config.connect_url(&base);
        tracing::debug!(url = %url, resuming, "Connecting to gateway");

        let connected = tokio::select! {
            biased;
            () = shutdown_requested(&mut self.shutdown) => return ConnectionEnd::Shutdown,
            result = self.shared.connector.connect(&url) => result,
        };
        let (sink, mut stream) = match connected {
            Ok(pair) => pair,
            Err(e) => return ConnectionEnd::Dropped(e.to_string()),
        };

        if !resuming {
            self.shared.set_state(SessionState::AwaitingHello);
        }

        let (outbound, mut writer) = spawn_writer(sink, self.shared.config.send_budget);
        *self.shared.outbound.write() = Some(outbound.clone());
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut conn = Connection {
            outbound,
            heartbeat: None,
            handshake: None,
            events_tx,
        };

        let end = loop {
            tokio::select! {
                biased;

                () = shutdown_requested(&mut self.shutdown) => break ConnectionEnd::Shutdown,

                Some(HeartbeatEvent::Zombied) = events_rx.recv() => break ConnectionEnd::Zombied,

                () = handshake_due(&mut conn.handshake) => {
                    conn.handshake = None;
                    self.send_handshake(&conn.outbound);
                }

                message = stream.next() => match message {
                    Some(Ok(message)) => {
                        if let Some(end) = self.handle_message(message, &mut conn) {
                            break end;
                        }
                    }
                    Some(Err(e)) => break ConnectionEnd::Dropped(e.to_string()),
                    None => break ConnectionEnd::Dropped("stream ended".to_string()),
                },
            }
        };

        // Heartbeat first so nothing else is queued behind the close
        conn.heartbeat = None;
        *self.shared.outbound.write() = None;

        let close = match &end {
            ConnectionEnd::Shutdown => Some((1000, "client shutdown")),
            ConnectionEnd::Zombied => Some((4000, "heartbeat not acknowledged")),
            ConnectionEnd::Reconnect => Some((4000, "reconnect requested")),
            ConnectionEnd::Closed { .. } | ConnectionEnd::Dropped(_) => None,
        };
        if let Some((code, reason)) = close {
            if conn.outbound.close(code, reason)
                && !writer.join_timeout(self.shared.config.close_timeout).await
            {
                tracing::debug!("Writer did not finish closing in time");
            }
        }

        end
    }

    fn handle_message(&mut self, message: Message, conn: &mut Connection) -> Option<ConnectionEnd> {
        let parsed = match message {
            Message::Text(text) => GatewayMessage::from_json(&text),
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => GatewayMessage::from_json(text),
                Err(e) => {
                    let err = ClientError::protocol(format!("binary frame is not UTF-8: {e}"));
                    tracing::warn!(error_code = err.error_code(), "{err}");
                    return None;
                }
            },
            Message::Close(frame) => {
                let (code, reason) = frame.map_or((NO_STATUS_CODE, String::new()), |frame| {
                    (u16::from(frame.code), frame.reason.into_owned())
                });
                return Some(ConnectionEnd::Closed { code, reason });
            }
            _ => return None,
        };

        match parsed {
            Ok(frame) => self.handle_frame(frame, conn),
            Err(e) => {
                let err = ClientError::from(e);
                tracing::warn!(error_code = err.error_code(), error = %err, "Dropping malformed frame");
                None
            }
        }
    }

    fn handle_frame(&mut self, frame: GatewayMessage, conn: &mut Connection) -> Option<ConnectionEnd> {
        if let Some(seq) = frame.s {
            self.shared.sequence.observe(seq);
        }
        tracing::trace!(op = %frame.op, t = ?frame.t, s = ?frame.s, "Frame received");

        match frame.op {
            OpCode::Hello => match frame.as_hello() {
                Some(hello) if hello.heartbeat_interval == 0 => {
                    let err = ClientError::protocol("hello frame with zero heartbeat_interval");
                    tracing::warn!(error_code = err.error_code(), "{err}");
                    return Some(ConnectionEnd::Dropped(err.to_string()));
                }
                // Handshake already sent on this connection
                Some(_) if conn.heartbeat.is_some() => {
                    tracing::debug!("Ignoring repeated hello");
                }
                Some(hello) => self.on_hello(hello.interval(), conn),
                None => {
                    let err = ClientError::protocol("hello frame without heartbeat_interval");
                    tracing::warn!(error_code = err.error_code(), "{err}");
                }
            },
            OpCode::HeartbeatAck => {
                if let Some(latency) = conn.heartbeat.as_ref().and_then(HeartbeatScheduler::acknowledge) {
                    tracing::trace!(latency_ms = latency.as_millis() as u64, "Heartbeat acknowledged");
                }
            }
            OpCode::Heartbeat => match &conn.heartbeat {
                Some(heartbeat) => {
                    heartbeat.beat_now();
                }
                None => {
                    let _ = conn
                        .outbound
                        .send(GatewayMessage::heartbeat(self.shared.sequence.get()));
                }
            },
            OpCode::Dispatch => self.on_dispatch(frame),
            OpCode::Reconnect => {
                tracing::info!("Gateway requested reconnect");
                return Some(ConnectionEnd::Reconnect);
            }
            OpCode::InvalidSession => {
                let resumable = frame.as_invalid_session_resumable().unwrap_or(false);
                self.on_invalid_session(resumable, conn);
            }
            other => {
                let err = ClientError::protocol(format!("unexpected opcode {other}"));
                tracing::debug!(error_code = err.error_code(), "{err}");
            }
        }
        None
    }

    fn on_hello(&self, interval: Duration, conn: &mut Connection) {
        conn.heartbeat = Some(HeartbeatScheduler::start(
            interval,
            Arc::clone(&self.shared.sequence),
            Arc::clone(&self.shared.heartbeat),
            conn.outbound.priority_lane(),
            conn.events_tx.clone(),
        ));

        let now = Instant::now();
        let due = {
            let data = self.shared.data.read();
            if data.can_resume() {
                now
            } else {
                data.identify_deadline(now)
            }
        };
        if !self.shared.data.read().can_resume() {
            self.shared.set_state(SessionState::Identifying);
        }

        if due <= now {
            self.send_handshake(&conn.outbound);
        } else {
            tracing::debug!(
                wait_ms = (due - now).as_millis() as u64,
                "Identify delayed by rate limit"
            );
            conn.handshake = Some(Box::pin(tokio::time::sleep_until(due)));
        }
    }

    /// Resume when a session exists, identify otherwise
    fn send_handshake(&self, outbound: &Outbound) {
        let session_id = self.shared.data.read().session_id.clone();

        let frame = if let Some(session_id) = session_id {
            let seq = self.shared.sequence.get();
            tracing::info!(session_id = %session_id, seq = ?seq, "Resuming gateway session");
            GatewayMessage::resume(&ResumePayload {
                token: self.token.clone(),
                session_id,
                seq,
            })
        } else {
            let config = &self.shared.config;
            let mut payload = IdentifyPayload::new(self.token.clone(), self.intents);
            payload.properties = config.properties.clone();
            payload.presence.clone_from(&config.presence);
            payload.large_threshold = config.large_threshold;
            tracing::info!(intents = self.intents.bits(), "Identifying");
            GatewayMessage::identify(&payload)
        };

        if let Err(e) = outbound.send(frame) {
            tracing::warn!(error = %e, "Failed to queue handshake");
        }
    }

    fn on_dispatch(&self, frame: GatewayMessage) {
        let Some(event) = frame.t else {
            let err = ClientError::protocol("dispatch frame without event name");
            tracing::warn!(error_code = err.error_code(), "{err}");
            return;
        };
        let payload = frame.d.unwrap_or(Value::Null);

        match GatewayEventType::parse(&event) {
            Some(GatewayEventType::Ready) => match serde_json::from_value::<ReadyEvent>(payload.clone()) {
                Ok(ready) => {
                    self.shared.data.write().record_ready(&ready);
                    self.shared.set_state(SessionState::Connected);
                    tracing::info!(
                        session_id = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "Gateway session ready"
                    );
                }
                Err(e) => {
                    let err = ClientError::from(e);
                    tracing::warn!(error_code = err.error_code(), error = %err, "Malformed READY payload");
                }
            },
            Some(GatewayEventType::Resumed) => {
                self.shared.data.write().reconnect_attempts = 0;
                self.shared.set_state(SessionState::Connected);
                tracing::info!(seq = ?self.shared.sequence.get(), "Gateway session resumed");
            }
            _ => {}
        }

        if self
            .dispatch_tx
            .send(DispatchJob {
                event,
                payload,
                sequence: frame.s,
            })
            .is_err()
        {
            tracing::warn!("Dispatch worker gone, event dropped");
        }
    }

    fn on_invalid_session(&self, resumable: bool, conn: &mut Connection) {
        tracing::warn!(resumable, "Gateway invalidated the session");
        if !resumable {
            self.shared.invalidate();
            self.shared.set_state(SessionState::Identifying);
        }

        let (min, max) = self.shared.config.invalid_session_delay;
        let delay = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        let now = Instant::now();
        let due = self.shared.data.read().identify_deadline(now + delay);
        conn.handshake = Some(Box::pin(tokio::time::sleep_until(due)));
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn handshake_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Read a retry-after from a close reason
///
/// Accepts `2`, `2.5`, `retry_after=2` and `{"retry_after":2}`, in seconds.
pub(crate) fn parse_retry_after(reason: &str) -> Option<Duration> {
    let trimmed = reason.trim();
    let raw = trimmed.strip_prefix("retry_after=").unwrap_or(trimmed);
    let seconds = match serde_json::from_str::<Value>(raw).ok()? {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("retry_after").and_then(Value::as_f64),
        _ => None,
    }?;
    Duration::try_from_secs_f64(seconds).ok()
}
