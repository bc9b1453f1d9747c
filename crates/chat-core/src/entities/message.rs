//! Message entity - enough of a message to route prefix commands

use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Message as delivered by MESSAGE_CREATE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Split a prefixed message into a command name and its arguments
    ///
    /// Returns `None` when the content does not start with `prefix` or
    /// nothing follows the prefix.
    pub fn prefixed_command(&self, prefix: &str) -> Option<(String, Vec<String>)> {
        if prefix.is_empty() {
            return None;
        }
        let rest = self.content.strip_prefix(prefix)?;
        let mut parts = rest.split_whitespace();
        let name = parts.next()?.to_string();
        Some((name, parts.map(String::from).collect()))
    }
}
