//! # chat-rest
//!
//! Thin authenticated HTTP client for the platform's REST API. The gateway
//! client only needs "send an authenticated request, get a response"; this
//! crate provides that plus bulk command registration.

pub mod client;
pub mod commands;
pub mod error;

pub use client::RestClient;
pub use commands::{CommandDefinition, CommandSync, RegisteredCommand};
pub use error::{RestError, RestResult};
