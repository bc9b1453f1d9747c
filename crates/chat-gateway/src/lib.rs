//! # chat-gateway
//!
//! Gateway client for the chat platform: keeps one authenticated streaming
//! connection alive and routes its events and commands to registered handlers.
//!
//! ```no_run
//! use chat_gateway::{GatewayConfig, GatewaySession, RegistrationCollector};
//! use chat_core::Intents;
//!
//! # async fn example() -> chat_common::ClientResult<()> {
//! let mut collector = RegistrationCollector::new();
//! collector.command_fn("ping", |_ctx| async { Ok(()) });
//! let registration = collector.finish();
//!
//! let session = GatewaySession::new(GatewayConfig::default(), registration.registry);
//! session.start("token", Intents::DEFAULT).await?;
//! session.closed().await
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::GatewayConfig;
pub use dispatch::{
    CommandContext, CommandHandler, CommandRouter, DispatchError, EventContext, EventDispatchRegistry,
    HandlerResult, Module, Registration, RegistrationCollector, RouteOutcome,
};
pub use protocol::{CloseCodeClassifier, CloseKind, GatewayMessage, OpCode};
pub use session::{GatewaySession, SessionState};
pub use transport::{Connector, TungsteniteConnector};
