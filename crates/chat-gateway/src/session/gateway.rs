//! Gateway session handle
//!
//! The public face of a session: start and stop the driver, send frames on
//! the live connection, and observe state.

use super::driver::{DispatchJob, Driver, SessionShared};
use super::SessionState;
use crate::config::GatewayConfig;
use crate::dispatch::{panic_message, EventDispatchRegistry};
use crate::protocol::{
    GatewayMessage, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload,
};
use crate::transport::{Connector, TungsteniteConnector};
use chat_common::{ClientError, ClientResult};
use chat_core::Intents;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Tasks of one `start` call
struct Running {
    shutdown: watch::Sender<bool>,
    driver: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// A gateway session
///
/// Created once per logical client. `start` spawns the driver and the
/// dispatch worker; `stop` tears both down.
pub struct GatewaySession {
    shared: Arc<SessionShared>,
    registry: Arc<EventDispatchRegistry>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("state", &self.state())
            .field("sequence", &self.sequence())
            .finish_non_exhaustive()
    }
}

impl GatewaySession {
    /// Session over real WebSockets
    #[must_use]
    pub fn new(config: GatewayConfig, registry: Arc<EventDispatchRegistry>) -> Self {
        Self::with_connector(config, registry, Arc::new(TungsteniteConnector))
    }

    /// Session over a custom transport
    #[must_use]
    pub fn with_connector(
        config: GatewayConfig,
        registry: Arc<EventDispatchRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared::new(config, connector)),
            registry,
            running: Mutex::new(None),
        }
    }

    /// Connect and authenticate in the background
    ///
    /// Does nothing if the session is already running.
    ///
    /// # Errors
    /// Returns [`ClientError::Configuration`] if the token is empty
    pub async fn start(&self, token: impl Into<String>, intents: Intents) -> ClientResult<()> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ClientError::Configuration("token must not be empty".to_string()));
        }

        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.driver.is_finished()) {
            tracing::debug!("Gateway session already running");
            return Ok(());
        }
        if let Some(previous) = running.take() {
            previous.worker.abort();
        }

        self.shared.outcome.send_replace(None);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_dispatch_worker(Arc::clone(&self.registry), dispatch_rx));
        let driver = Driver::new(Arc::clone(&self.shared), token, intents, shutdown_rx, dispatch_tx);
        let shared = Arc::clone(&self.shared);

        let driver = tokio::spawn(async move {
            let result = match AssertUnwindSafe(driver.run()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    shared.reset();
                    Err(ClientError::Internal(format!(
                        "session driver panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                }
            };
            match &result {
                Ok(()) => tracing::info!("Gateway session stopped"),
                Err(e) => tracing::error!(error_code = e.error_code(), error = %e, "Gateway session terminated"),
            }
            shared.outcome.send_replace(Some(result));
        });

        tracing::info!(intents = intents.bits(), "Gateway session starting");
        *running = Some(Running {
            shutdown: shutdown_tx,
            driver,
            worker,
        });
        Ok(())
    }

    /// Close the connection, stop every task, and forget the session
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let taken = self.running.lock().await.take();

        if let Some(running) = taken {
            let _ = running.shutdown.send(true);
            if let Err(e) = running.driver.await {
                tracing::warn!(error = %e, "Session driver did not exit cleanly");
            }

            let mut worker = running.worker;
            let timeout = self.shared.config.close_timeout;
            if tokio::time::timeout(timeout, &mut worker).await.is_err() {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Dispatch worker still busy, aborting"
                );
                worker.abort();
            }
        }

        self.shared.reset();
        self.shared.outcome.send_if_modified(|outcome| {
            if outcome.is_none() {
                *outcome = Some(Ok(()));
                true
            } else {
                false
            }
        });
    }

    /// Send a client frame on the live connection
    ///
    /// # Errors
    /// [`ClientError::Protocol`] for ops the application may not send,
    /// [`ClientError::NotConnected`] unless the session is connected
    pub fn send(&self, op: OpCode, payload: Value) -> ClientResult<()> {
        if !op.is_client_op() || op.is_handshake_op() {
            return Err(ClientError::protocol(format!("{op} cannot be sent by the application")));
        }
        if !self.state().is_connected() {
            return Err(ClientError::NotConnected);
        }
        let outbound = self.shared.outbound.read().clone().ok_or(ClientError::NotConnected)?;

        outbound.send(GatewayMessage {
            op,
            t: None,
            s: None,
            d: Some(payload),
        })
    }

    /// # Errors
    /// See [`send`](Self::send)
    pub fn update_presence(&self, presence: &PresenceUpdatePayload) -> ClientResult<()> {
        if !presence.is_valid_status() {
            return Err(ClientError::protocol(format!("invalid status {:?}", presence.status)));
        }
        self.send(OpCode::PresenceUpdate, serde_json::to_value(presence)?)
    }

    /// # Errors
    /// See [`send`](Self::send)
    pub fn update_voice_state(&self, voice: &VoiceStateUpdatePayload) -> ClientResult<()> {
        self.send(OpCode::VoiceStateUpdate, serde_json::to_value(voice)?)
    }

    /// # Errors
    /// See [`send`](Self::send)
    pub fn request_guild_members(&self, request: &RequestGuildMembersPayload) -> ClientResult<()> {
        self.send(OpCode::RequestGuildMembers, serde_json::to_value(request)?)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Receiver that sees every state change
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.shared.sequence.get()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.shared.data.read().session_id.clone()
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.shared.heartbeat.latency()
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EventDispatchRegistry> {
        &self.registry
    }

    /// Wait for the driver to finish and return its result
    ///
    /// Returns `Ok(())` right away if the session was never started.
    ///
    /// # Errors
    /// The terminal error that ended the session, e.g. [`ClientError::Fatal`]
    pub async fn closed(&self) -> ClientResult<()> {
        let mut rx = self.shared.outcome.subscribe();
        let pending = rx.borrow().is_none();
        if pending && self.running.lock().await.is_none() {
            return Ok(());
        }
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|current| (*current).clone());
        outcome.unwrap_or(Ok(()))
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown.send(true);
            running.worker.abort();
        }
    }
}

/// Feed dispatch frames to the registry one at a time, in arrival order
async fn run_dispatch_worker(registry: Arc<EventDispatchRegistry>, mut jobs: mpsc::UnboundedReceiver<DispatchJob>) {
    while let Some(job) = jobs.recv().await {
        let summary = registry.dispatch(&job.event, job.payload, job.sequence).await;
        tracing::trace!(
            event = %job.event,
            seq = ?job.sequence,
            handled = summary.handled,
            failed = summary.failed,
            "Event dispatched"
        );
    }
    tracing::debug!("Dispatch worker exiting");
}
