//! # chat-core
//!
//! Platform model shared by the client crates: identifiers, intents, and the
//! handful of entities the gateway core reads to route events.
//! This crate has zero dependencies on infrastructure (sockets, HTTP, runtime).

pub mod entities;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Interaction, InteractionData, InteractionMember, InteractionType, Message, User};
pub use value_objects::{Intents, Snowflake, SnowflakeParseError};
