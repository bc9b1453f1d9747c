//! Event dispatch registry
//!
//! Maps dispatch event names to an ordered list of handler bindings and
//! forwards command invocations to the [`CommandRouter`].

use super::handler::{
    panicked, run_guarded, CommandContext, EventContext, HandlerDescriptor, HandlerResult, ParamShape,
};
use super::router::{CommandRouter, RouteOutcome};
use super::DispatchError;
use crate::events::GatewayEventType;
use chat_core::{Interaction, Message};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type EventCall =
    Arc<dyn Fn(&EventContext) -> Result<BoxFuture<'static, HandlerResult>, DispatchError> + Send + Sync>;

/// A descriptor paired with the closure that decodes and invokes it
#[derive(Clone)]
pub struct EventBinding {
    pub descriptor: HandlerDescriptor,
    call: EventCall,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl EventBinding {
    /// Handler that takes no arguments
    pub fn none<F, Fut>(event: &str, owner: &'static str, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            descriptor: HandlerDescriptor::event(event, ParamShape::None, owner),
            call: Arc::new(move |_ctx| Ok(f().boxed())),
        }
    }

    /// Handler that receives the raw [`EventContext`]
    pub fn raw<F, Fut>(event: &str, owner: &'static str, f: F) -> Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            descriptor: HandlerDescriptor::event(event, ParamShape::Raw, owner),
            call: Arc::new(move |ctx| Ok(f(ctx.clone()).boxed())),
        }
    }

    /// Handler that receives the payload decoded as `T`
    pub fn typed<T, F, Fut>(event: &str, owner: &'static str, f: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let shape = std::any::type_name::<T>();
        Self {
            descriptor: HandlerDescriptor::event(event, ParamShape::Typed(shape), owner),
            call: Arc::new(move |ctx| {
                let value = ctx.decode::<T>().map_err(|source| DispatchError::Decode {
                    event: ctx.event.clone(),
                    shape: shape.to_string(),
                    source,
                })?;
                Ok(f(value).boxed())
            }),
        }
    }

    /// Decode and invoke, turning every failure into a [`DispatchError`]
    async fn invoke(&self, ctx: &EventContext) -> Result<(), DispatchError> {
        let future = match catch_unwind(AssertUnwindSafe(|| (self.call)(ctx))) {
            Ok(result) => result?,
            Err(panic) => return Err(panicked(&self.descriptor, panic.as_ref())),
        };
        run_guarded(&self.descriptor, future).await
    }
}

/// What a single [`EventDispatchRegistry::dispatch`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Event handlers that completed
    pub handled: usize,
    /// Event handlers that failed to decode, errored, or panicked
    pub failed: usize,
    /// Outcome of command routing, when the event carried a command
    pub command: Option<RouteOutcome>,
}

/// Event name to ordered handler list
#[derive(Debug, Default)]
pub struct EventDispatchRegistry {
    handlers: RwLock<HashMap<String, Vec<EventBinding>>>,
    router: Option<Arc<CommandRouter>>,
    prefix: Option<String>,
}

impl EventDispatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward command invocations to `router`
    #[must_use]
    pub fn with_router(mut self, router: Arc<CommandRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Also route `MESSAGE_CREATE` content starting with `prefix`
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    #[must_use]
    pub fn router(&self) -> Option<&Arc<CommandRouter>> {
        self.router.as_ref()
    }

    /// Append a binding after any existing ones for its event
    pub(crate) fn insert(&self, binding: EventBinding) {
        tracing::debug!(
            event = %binding.descriptor.name,
            shape = %binding.descriptor.shape,
            owner = binding.descriptor.owner,
            "Event handler registered"
        );
        self.handlers
            .write()
            .entry(binding.descriptor.name.clone())
            .or_default()
            .push(binding);
    }

    /// Register a handler that takes no arguments
    pub fn on<F, Fut>(&self, event: &str, f: F) -> &Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(EventBinding::none(event, std::any::type_name::<F>(), f));
        self
    }

    /// Register a handler that receives the raw event context
    pub fn on_raw<F, Fut>(&self, event: &str, f: F) -> &Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(EventBinding::raw(event, std::any::type_name::<F>(), f));
        self
    }

    /// Register a handler that receives the payload decoded as `T`
    pub fn on_typed<T, F, Fut>(&self, event: &str, f: F) -> &Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(EventBinding::typed(event, std::any::type_name::<F>(), f));
        self
    }

    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Descriptors for `event`, in registration order
    #[must_use]
    pub fn descriptors(&self, event: &str) -> Vec<HandlerDescriptor> {
        self.handlers
            .read()
            .get(event)
            .map(|bindings| bindings.iter().map(|b| b.descriptor.clone()).collect())
            .unwrap_or_default()
    }

    /// Event names with at least one handler, sorted
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Hand one dispatch frame to its handlers
    ///
    /// Application-command interactions go to the router only. Prefixed
    /// messages go to the router and then to the normal handlers.
    /// Failures are logged; they never stop later handlers.
    pub async fn dispatch(&self, event: &str, payload: Value, sequence: Option<u64>) -> DispatchSummary {
        let ctx = EventContext {
            event: event.to_string(),
            sequence,
            payload,
        };
        let mut summary = DispatchSummary::default();

        match GatewayEventType::parse(event) {
            Some(GatewayEventType::InteractionCreate) => {
                if let Some(command) = Self::slash_command(&ctx) {
                    summary.command = Some(self.route(command).await);
                    return summary;
                }
            }
            Some(GatewayEventType::MessageCreate) => {
                if let Some(command) = self.prefix_command(&ctx) {
                    summary.command = Some(self.route(command).await);
                }
            }
            _ => {}
        }

        self.fan_out(&ctx, &mut summary).await;
        summary
    }

    fn slash_command(ctx: &EventContext) -> Option<CommandContext> {
        let interaction = match ctx.decode::<Interaction>() {
            Ok(interaction) => interaction,
            Err(e) => {
                tracing::debug!(error = %e, "INTERACTION_CREATE payload is not an interaction");
                return None;
            }
        };
        CommandContext::from_interaction(interaction, ctx.sequence)
    }

    fn prefix_command(&self, ctx: &EventContext) -> Option<CommandContext> {
        let prefix = self.prefix.as_deref()?;
        self.router.as_ref()?;
        let message = ctx.decode::<Message>().ok()?;
        CommandContext::from_message(message, prefix, ctx.sequence)
    }

    async fn route(&self, command: CommandContext) -> RouteOutcome {
        let Some(router) = &self.router else {
            let err = DispatchError::CommandNotFound(command.name.to_lowercase());
            tracing::warn!(
                command = %command.name,
                error_code = err.error_code(),
                "No command router attached"
            );
            return RouteOutcome::NotFound;
        };
        let name = command.name.clone();
        router.route(&name, command).await
    }

    async fn fan_out(&self, ctx: &EventContext, summary: &mut DispatchSummary) {
        // Snapshot so handlers may register more handlers without deadlocking
        let bindings = match self.handlers.read().get(&ctx.event) {
            Some(bindings) => bindings.clone(),
            None => {
                tracing::trace!(event = %ctx.event, "No handlers for event");
                return;
            }
        };

        for binding in &bindings {
            match binding.invoke(ctx).await {
                Ok(()) => summary.handled += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        event = %ctx.event,
                        owner = binding.descriptor.owner,
                        error_code = err.error_code(),
                        error = %err,
                        "Event handler failed"
                    );
                }
            }
        }
    }
}
