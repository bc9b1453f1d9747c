//! Out-of-band command registration
//!
//! Command metadata lives on the platform, not in the gateway session.
//! [`CommandSync`] pushes the locally bound names in one bulk overwrite.

use crate::client::RestClient;
use crate::error::RestResult;
use chat_core::Snowflake;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat-input (slash) command type
pub const CHAT_INPUT: u8 = 1;

/// Command metadata sent to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

impl CommandDefinition {
    /// Slash command with a description
    #[must_use]
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            description: description.into(),
            kind: CHAT_INPUT,
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, option: Value) -> Self {
        self.options.push(option);
        self
    }

    /// One definition per bound command name, with a generated description
    pub fn from_names<I, S>(names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                Self::chat_input(name, format!("Run the {name} command"))
            })
            .collect()
    }
}

/// Command as stored by the platform
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredCommand {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub application_id: Option<Snowflake>,
}

/// Bulk command registration over REST
#[derive(Debug, Clone, Copy)]
pub struct CommandSync<'a> {
    client: &'a RestClient,
}

impl<'a> CommandSync<'a> {
    #[must_use]
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// Replace every global command of `application_id` with `definitions`
    pub async fn bulk_overwrite_global_commands(
        &self,
        application_id: Snowflake,
        definitions: &[CommandDefinition],
    ) -> RestResult<Vec<RegisteredCommand>> {
        let registered: Vec<RegisteredCommand> = self
            .client
            .put(&format!("applications/{application_id}/commands"), definitions)
            .await?;
        tracing::info!(
            application_id = %application_id,
            commands = registered.len(),
            "Global commands synced"
        );
        Ok(registered)
    }

    /// Replace every command of `application_id` in one guild
    pub async fn bulk_overwrite_guild_commands(
        &self,
        application_id: Snowflake,
        guild_id: Snowflake,
        definitions: &[CommandDefinition],
    ) -> RestResult<Vec<RegisteredCommand>> {
        let registered: Vec<RegisteredCommand> = self
            .client
            .put(
                &format!("applications/{application_id}/guilds/{guild_id}/commands"),
                definitions,
            )
            .await?;
        tracing::info!(
            application_id = %application_id,
            guild_id = %guild_id,
            commands = registered.len(),
            "Guild commands synced"
        );
        Ok(registered)
    }
}
