//! Startup registration
//!
//! A [`RegistrationCollector`] runs once before the session connects and
//! fills both the event registry and the command router.

use super::handler::{CommandContext, CommandHandler, EventContext, FnCommand, HandlerDescriptor, HandlerResult};
use super::registry::{EventBinding, EventDispatchRegistry};
use super::router::CommandRouter;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// A group of handlers registered together
pub trait Module: Send + Sync {
    /// Owner name recorded on every descriptor this module registers
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn register(&self, collector: &mut RegistrationCollector);
}

/// Filled registries, ready to hand to a session
#[derive(Debug, Clone)]
pub struct Registration {
    pub registry: Arc<EventDispatchRegistry>,
    pub router: Arc<CommandRouter>,
    /// Names of the modules that registered, in order
    pub modules: Vec<&'static str>,
}

impl Registration {
    #[must_use]
    pub fn command_names(&self) -> Vec<String> {
        self.router.names()
    }
}

/// Builder for the event registry and command router
#[derive(Debug)]
pub struct RegistrationCollector {
    registry: EventDispatchRegistry,
    router: Arc<CommandRouter>,
    modules: Vec<&'static str>,
    owner: Option<&'static str>,
}

impl Default for RegistrationCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationCollector {
    #[must_use]
    pub fn new() -> Self {
        let router = Arc::new(CommandRouter::new());
        Self {
            registry: EventDispatchRegistry::new().with_router(Arc::clone(&router)),
            router,
            modules: Vec::new(),
            owner: None,
        }
    }

    /// Enable prefix commands on `MESSAGE_CREATE`
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry = self.registry.with_prefix(prefix);
        self
    }

    /// Let a module register its handlers under its own name
    pub fn module<M: Module>(&mut self, module: &M) -> &mut Self {
        let name = module.name();
        let previous = self.owner.replace(name);
        module.register(self);
        self.owner = previous;
        self.modules.push(name);
        tracing::debug!(module = name, "Module registered");
        self
    }

    fn owner_or<F>(&self) -> &'static str {
        self.owner.unwrap_or_else(std::any::type_name::<F>)
    }

    /// Register an event handler that takes no arguments
    pub fn event<F, Fut>(&mut self, event: &str, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let owner = self.owner_or::<F>();
        self.registry.insert(EventBinding::none(event, owner, f));
        self
    }

    /// Register an event handler that receives the raw context
    pub fn event_raw<F, Fut>(&mut self, event: &str, f: F) -> &mut Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let owner = self.owner_or::<F>();
        self.registry.insert(EventBinding::raw(event, owner, f));
        self
    }

    /// Register an event handler that receives the decoded payload
    pub fn event_typed<T, F, Fut>(&mut self, event: &str, f: F) -> &mut Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let owner = self.owner_or::<F>();
        self.registry.insert(EventBinding::typed(event, owner, f));
        self
    }

    /// Bind a command handler; a later binding for the same name wins
    pub fn command<H: CommandHandler>(&mut self, name: &str, handler: H) -> &mut Self {
        let owner = self.owner_or::<H>();
        self.router
            .register(name, HandlerDescriptor::command(name, owner), Arc::new(handler));
        self
    }

    /// Bind an async closure as a command
    pub fn command_fn<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let owner = self.owner_or::<F>();
        self.router
            .register(name, HandlerDescriptor::command(name, owner), Arc::new(FnCommand(f)));
        self
    }

    #[must_use]
    pub fn finish(self) -> Registration {
        tracing::info!(
            modules = self.modules.len(),
            events = self.registry.event_names().len(),
            commands = self.router.len(),
            "Handler registration complete"
        );
        Registration {
            registry: Arc::new(self.registry),
            router: self.router,
            modules: self.modules,
        }
    }
}
