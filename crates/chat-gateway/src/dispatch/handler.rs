//! Handler descriptors and invocation contexts

use super::error::{panic_message, DispatchError};
use async_trait::async_trait;
use chat_core::{Interaction, Message, Snowflake, User};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// What every handler returns
pub type HandlerResult = anyhow::Result<()>;

/// Whether a handler serves an event name or a command name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Event,
    Command,
}

/// What a handler receives, decided once at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamShape {
    /// Nothing
    None,
    /// The raw [`EventContext`]
    Raw,
    /// The payload decoded into the named type
    Typed(&'static str),
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Raw => f.write_str("raw"),
            Self::Typed(name) => f.write_str(name),
        }
    }
}

/// Immutable description of a registered handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    /// Event or (lower-cased) command name
    pub name: String,
    pub kind: HandlerKind,
    pub shape: ParamShape,
    /// Type that registered the handler
    pub owner: &'static str,
}

impl HandlerDescriptor {
    #[must_use]
    pub fn event(name: impl Into<String>, shape: ParamShape, owner: &'static str) -> Self {
        Self {
            name: name.into(),
            kind: HandlerKind::Event,
            shape,
            owner,
        }
    }

    #[must_use]
    pub fn command(name: impl Into<String>, owner: &'static str) -> Self {
        Self {
            name: name.into(),
            kind: HandlerKind::Command,
            shape: ParamShape::Typed("CommandContext"),
            owner,
        }
    }
}

/// A dispatch frame as seen by event handlers
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event: String,
    pub sequence: Option<u64>,
    pub payload: Value,
}

impl EventContext {
    /// Decode the payload into a typed structure
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Where a command invocation came from
#[derive(Debug, Clone)]
pub enum InvocationSource {
    /// Application command interaction
    Slash(Box<Interaction>),
    /// Text message starting with the command prefix
    Prefix(Box<Message>),
}

/// Everything a command handler gets
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Command name as invoked
    pub name: String,
    /// Whitespace-split arguments (prefix commands only)
    pub args: Vec<String>,
    pub source: InvocationSource,
    pub sequence: Option<u64>,
}

impl CommandContext {
    /// Build a context from an application-command interaction
    #[must_use]
    pub fn from_interaction(interaction: Interaction, sequence: Option<u64>) -> Option<Self> {
        if !interaction.is_command() {
            return None;
        }
        let name = interaction.command_name()?.to_string();
        Some(Self {
            name,
            args: Vec::new(),
            source: InvocationSource::Slash(Box::new(interaction)),
            sequence,
        })
    }

    /// Build a context from a prefixed message; bot authors are ignored
    #[must_use]
    pub fn from_message(message: Message, prefix: &str, sequence: Option<u64>) -> Option<Self> {
        if message.author.is_bot() {
            return None;
        }
        let (name, args) = message.prefixed_command(prefix)?;
        Some(Self {
            name,
            args,
            source: InvocationSource::Prefix(Box::new(message)),
            sequence,
        })
    }

    pub fn invoker(&self) -> Option<&User> {
        match &self.source {
            InvocationSource::Slash(interaction) => interaction.invoker(),
            InvocationSource::Prefix(message) => Some(&message.author),
        }
    }

    pub fn channel_id(&self) -> Option<Snowflake> {
        match &self.source {
            InvocationSource::Slash(interaction) => interaction.channel_id,
            InvocationSource::Prefix(message) => Some(message.channel_id),
        }
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        match &self.source {
            InvocationSource::Slash(interaction) => interaction.guild_id,
            InvocationSource::Prefix(message) => message.guild_id,
        }
    }

    /// Slash command options, empty for prefix commands
    pub fn options(&self) -> &[Value] {
        match &self.source {
            InvocationSource::Slash(interaction) => interaction
                .data
                .as_ref()
                .map_or(&[][..], |data| data.options.as_slice()),
            InvocationSource::Prefix(_) => &[],
        }
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        match &self.source {
            InvocationSource::Slash(interaction) => Some(interaction),
            InvocationSource::Prefix(_) => None,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match &self.source {
            InvocationSource::Prefix(message) => Some(message),
            InvocationSource::Slash(_) => None,
        }
    }
}

/// A command implementation bound in the [`CommandRouter`](super::CommandRouter)
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: CommandContext) -> HandlerResult;
}

/// Adapter turning an async closure into a [`CommandHandler`]
pub struct FnCommand<F>(pub F);

#[async_trait]
impl<F, Fut> CommandHandler for FnCommand<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> HandlerResult {
        (self.0)(ctx).await
    }
}

/// Run a handler future, turning errors and panics into [`DispatchError`]s
pub(crate) async fn run_guarded(
    descriptor: &HandlerDescriptor,
    future: BoxFuture<'static, HandlerResult>,
) -> Result<(), DispatchError> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DispatchError::HandlerFailed {
            name: descriptor.name.clone(),
            owner: descriptor.owner,
            message: format!("{e:#}"),
        }),
        Err(panic) => Err(panicked(descriptor, panic.as_ref())),
    }
}

pub(crate) fn panicked(descriptor: &HandlerDescriptor, payload: &(dyn std::any::Any + Send)) -> DispatchError {
    DispatchError::HandlerPanicked {
        name: descriptor.name.clone(),
        owner: descriptor.owner,
        message: panic_message(payload),
    }
}
