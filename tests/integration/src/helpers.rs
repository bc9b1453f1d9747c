//! Test helpers for integration tests
//!
//! Provides an in-memory [`Connector`] whose server side is driven by the
//! test, and a real WebSocket mock gateway built on axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chat_gateway::protocol::{GatewayMessage, OpCode};
use chat_gateway::transport::{close_message, Connector, Message, TransportError, WsSink, WsStream};
use chat_gateway::{GatewaySession, SessionState};
use futures::channel::mpsc as fmpsc;
use futures::FutureExt;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::fixtures;

/// How long helpers wait before failing a test
pub const WAIT: Duration = Duration::from_secs(120);

/// One `connect` call seen by the [`MockConnector`]
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub url: String,
    pub at: Instant,
    pub succeeded: bool,
}

/// In-memory transport; every successful connect hands a [`ServerSide`] to the test
pub struct MockConnector {
    attempts: Mutex<Vec<ConnectAttempt>>,
    servers: mpsc::UnboundedSender<ServerSide>,
    fail_all: AtomicBool,
    fail_next: AtomicU32,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, MockServer) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: Mutex::new(Vec::new()),
            servers,
            fail_all: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
        });
        (connector, MockServer { accepted })
    }

    /// Refuse every connect from now on
    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Refuse the next `n` connects
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsStream), TransportError> {
        let failed = self.should_fail();
        self.attempts.lock().push(ConnectAttempt {
            url: url.to_string(),
            at: Instant::now(),
            succeeded: !failed,
        });
        if failed {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (client_tx, client_rx) = fmpsc::unbounded::<Message>();
        let (server_tx, server_rx) = fmpsc::unbounded::<Result<Message, TransportError>>();

        let sink: WsSink = Box::pin(client_tx.sink_map_err(|_| TransportError::Closed));
        let stream: WsStream = Box::pin(server_rx);

        let server = ServerSide {
            url: url.to_string(),
            to_client: server_tx,
            from_client: client_rx,
        };
        self.servers
            .send(server)
            .map_err(|_| TransportError::Connect("test server gone".to_string()))?;
        Ok((sink, stream))
    }
}

/// Receives the server side of each accepted connection
pub struct MockServer {
    accepted: mpsc::UnboundedReceiver<ServerSide>,
}

impl MockServer {
    /// Wait for the client's next successful connect
    pub async fn accept(&mut self) -> ServerSide {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// A connection that was already made, if any
    pub fn try_accept(&mut self) -> Option<ServerSide> {
        self.accepted.try_recv().ok()
    }
}

/// The gateway's end of one in-memory connection
pub struct ServerSide {
    pub url: String,
    to_client: fmpsc::UnboundedSender<Result<Message, TransportError>>,
    from_client: fmpsc::UnboundedReceiver<Message>,
}

impl ServerSide {
    pub fn send(&self, frame: GatewayMessage) {
        let json = frame.to_json().expect("frame encodes");
        let _ = self.to_client.unbounded_send(Ok(Message::Text(json)));
    }

    /// Send a raw text frame, e.g. malformed JSON
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(Message::Text(text.to_string())));
    }

    /// Send a close frame
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.to_client.unbounded_send(Ok(close_message(code, reason)));
    }

    /// End the stream without a close frame
    pub fn hang_up(self) {
        drop(self);
    }

    /// Next raw message from the client; `None` once the client closed its sink
    pub async fn next_message(&mut self) -> Option<Message> {
        tokio::time::timeout(WAIT, self.from_client.next())
            .await
            .expect("timed out waiting for a client message")
    }

    /// Next non-heartbeat frame; heartbeats are acknowledged along the way
    pub async fn recv(&mut self) -> Option<GatewayMessage> {
        loop {
            match self.next_message().await? {
                Message::Text(text) => {
                    let frame = GatewayMessage::from_json(&text).expect("client sent valid JSON");
                    if frame.op == OpCode::Heartbeat {
                        self.send(GatewayMessage::heartbeat_ack());
                        continue;
                    }
                    return Some(frame);
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
    }

    /// Next non-heartbeat frame, asserting its opcode
    pub async fn recv_op(&mut self, op: OpCode) -> GatewayMessage {
        let frame = self.recv().await.unwrap_or_else(|| panic!("connection closed waiting for {op}"));
        assert_eq!(frame.op, op, "unexpected frame: {frame}");
        frame
    }

    /// Frames already queued by the client, heartbeats excluded
    pub fn drain(&mut self) -> Vec<GatewayMessage> {
        let mut frames = Vec::new();
        while let Some(Some(message)) = self.from_client.next().now_or_never() {
            if let Message::Text(text) = message {
                if let Ok(frame) = GatewayMessage::from_json(&text) {
                    if frame.op != OpCode::Heartbeat {
                        frames.push(frame);
                    }
                }
            }
        }
        frames
    }
}

/// Close code of a client close frame
pub fn close_code(message: &Message) -> Option<u16> {
    match message {
        Message::Close(Some(frame)) => Some(u16::from(frame.code)),
        _ => None,
    }
}

/// Wait until the session reports `state`
pub async fn wait_for_state(session: &GatewaySession, state: SessionState) {
    let mut changes = session.state_changes();
    tokio::time::timeout(WAIT, changes.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {state}"))
        .expect("session dropped");
}

/// Accept a connection and walk it through hello, identify, and READY
pub async fn connect_ready(server: &mut MockServer, session: &GatewaySession, session_id: &str) -> ServerSide {
    let mut conn = server.accept().await;
    conn.send(fixtures::hello(45_000));
    conn.recv_op(OpCode::Identify).await;
    conn.send(fixtures::ready(session_id, 1));
    wait_for_state(session, SessionState::Connected).await;
    conn
}

/// Ops the [`TestGateway`] received, in order
pub type ReceivedOps = Arc<Mutex<Vec<OpCode>>>;

#[derive(Clone)]
struct GatewayState {
    received: ReceivedOps,
}

/// Real WebSocket mock gateway
///
/// Sends hello, answers identify with READY (s=1) followed by a `FOO`
/// dispatch (s=2), and acknowledges heartbeats.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub received: ReceivedOps,
    _handle: JoinHandle<()>,
}

impl TestGateway {
    pub async fn start() -> Result<Self> {
        let received: ReceivedOps = Arc::new(Mutex::new(Vec::new()));
        let state = GatewayState {
            received: Arc::clone(&received),
        };

        let app = Router::new().route("/", get(ws_handler)).with_state(state);

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            received,
            _handle: handle,
        })
    }

    /// Gateway URL for [`GatewayConfig::new`](chat_gateway::GatewayConfig::new)
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| serve_session(socket, state))
}

async fn serve_session(mut socket: WebSocket, state: GatewayState) {
    if send_frame(&mut socket, &fixtures::hello(45_000)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let AxumMessage::Text(text) = message else {
            continue;
        };
        let Ok(frame) = GatewayMessage::from_json(&text) else {
            continue;
        };
        state.received.lock().push(frame.op);

        let replies = match frame.op {
            OpCode::Heartbeat => vec![GatewayMessage::heartbeat_ack()],
            OpCode::Identify => vec![
                fixtures::ready("abc", 1),
                fixtures::dispatch("FOO", 2, json!({"value": 42})),
            ],
            _ => Vec::new(),
        };
        for reply in &replies {
            if send_frame(&mut socket, reply).await.is_err() {
                return;
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &GatewayMessage) -> Result<()> {
    socket.send(AxumMessage::Text(frame.to_json()?)).await?;
    Ok(())
}

/// Mock REST API under `/api/v10`
///
/// Accepts only `Authorization: Bot <TEST_TOKEN>`.
pub struct TestRestServer {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestRestServer {
    pub async fn start() -> Result<Self> {
        let app = Router::new()
            .route("/api/v10/users/@me", get(current_user))
            .route(
                "/api/v10/applications/:app_id/commands",
                put(overwrite_commands),
            )
            .route("/api/v10/limited", get(rate_limited))
            .route("/api/v10/missing", get(missing));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, _handle: handle })
    }

    /// Versioned base URL for [`RestClient::new`](chat_rest::RestClient::new)
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v10", self.addr)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bot {}", fixtures::TEST_TOKEN).as_str())
}

async fn current_user(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"id": "100", "username": "test-bot", "bot": true})).into_response()
}

async fn overwrite_commands(
    Path(app_id): Path<String>,
    headers: HeaderMap,
    Json(definitions): Json<Vec<Value>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "401: Unauthorized").into_response();
    }
    let registered: Vec<Value> = definitions
        .iter()
        .enumerate()
        .map(|(i, def)| {
            json!({
                "id": (1000 + i).to_string(),
                "application_id": app_id,
                "name": def["name"],
                "description": def["description"],
            })
        })
        .collect();
    Json(registered).into_response()
}

async fn rate_limited() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({"message": "You are being rate limited.", "retry_after": 1.5})),
    )
        .into_response()
}

async fn missing() -> Response {
    (StatusCode::NOT_FOUND, "404: Not Found").into_response()
}
