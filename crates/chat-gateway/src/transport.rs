//! Socket transport seam
//!
//! The session talks to the gateway through a boxed sink/stream pair so tests
//! can swap the real WebSocket for an in-memory one.

use async_trait::async_trait;
use futures::{Sink, Stream};
use futures_util::{SinkExt, StreamExt, TryStreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite;

pub use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
pub use tokio_tungstenite::tungstenite::protocol::CloseFrame;
pub use tokio_tungstenite::tungstenite::Message;

/// Outbound half of a connection
pub type WsSink = Pin<Box<dyn Sink<Message, Error = TransportError> + Send>>;

/// Inbound half of a connection
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, TransportError>> + Send>>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Connect failed: {0}")]
    Connect(String),
}

/// Opens connections to a gateway URL
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsStream), TransportError>;
}

/// Production connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(WsSink, WsStream), TransportError> {
        let (socket, response) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = socket.split();
        let sink: WsSink = Box::pin(sink.sink_map_err(TransportError::from));
        let stream: WsStream = Box::pin(stream.map_err(TransportError::from));
        Ok((sink, stream))
    }
}

/// Build a close message
#[must_use]
pub fn close_message(code: u16, reason: impl Into<String>) -> Message {
    let reason: String = reason.into();
    Message::Close(Some(CloseFrame {
        code: WsCloseCode::from(code),
        reason: reason.into(),
    }))
}
