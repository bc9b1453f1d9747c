//! Command router
//!
//! Maps a case-normalized command name to exactly one binding.

use super::handler::{run_guarded, CommandContext, CommandHandler, FnCommand, HandlerDescriptor, HandlerResult};
use super::DispatchError;
use dashmap::DashMap;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// A descriptor paired with its live handler
#[derive(Clone)]
pub struct CommandBinding {
    pub descriptor: HandlerDescriptor,
    pub handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Result of routing one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The bound handler ran to completion
    Invoked,
    /// No binding for the name; nothing ran
    NotFound,
    /// The handler returned an error or panicked
    Failed(String),
}

/// Command name to handler table
#[derive(Debug, Default)]
pub struct CommandRouter {
    bindings: DashMap<String, CommandBinding>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler, replacing any earlier binding for the same name
    ///
    /// Returns the replaced binding.
    pub fn register(
        &self,
        name: &str,
        mut descriptor: HandlerDescriptor,
        handler: Arc<dyn CommandHandler>,
    ) -> Option<CommandBinding> {
        let key = normalize(name);
        descriptor.name.clone_from(&key);
        let previous = self
            .bindings
            .insert(key.clone(), CommandBinding { descriptor, handler });

        if let Some(previous) = &previous {
            tracing::debug!(
                command = %key,
                replaced_owner = previous.descriptor.owner,
                "Command binding replaced"
            );
        } else {
            tracing::debug!(command = %key, "Command registered");
        }
        previous
    }

    pub(crate) fn bind(&self, name: &str, owner: &'static str, handler: Arc<dyn CommandHandler>) -> &Self {
        self.register(name, HandlerDescriptor::command(name, owner), handler);
        self
    }

    /// Bind a [`CommandHandler`] implementation
    pub fn command<H: CommandHandler>(&self, name: &str, handler: H) -> &Self {
        self.bind(name, std::any::type_name::<H>(), Arc::new(handler))
    }

    /// Bind an async closure
    pub fn command_fn<F, Fut>(&self, name: &str, f: F) -> &Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.bind(name, std::any::type_name::<F>(), Arc::new(FnCommand(f)))
    }

    /// Invoke the handler bound to `name`
    ///
    /// Errors and panics are caught here and logged with the command name.
    pub async fn route(&self, name: &str, ctx: CommandContext) -> RouteOutcome {
        let key = normalize(name);
        // Clone out of the map so no shard lock is held across the await
        let binding = self.bindings.get(&key).map(|entry| entry.value().clone());

        let Some(binding) = binding else {
            let err = DispatchError::CommandNotFound(key);
            tracing::warn!(command = %name, error_code = err.error_code(), "{err}");
            return RouteOutcome::NotFound;
        };

        let handler = Arc::clone(&binding.handler);
        let future = async move { handler.handle(ctx).await }.boxed();

        match run_guarded(&binding.descriptor, future).await {
            Ok(()) => {
                tracing::debug!(command = %key, "Command handled");
                RouteOutcome::Invoked
            }
            Err(err) => {
                tracing::error!(
                    command = %key,
                    owner = binding.descriptor.owner,
                    error_code = err.error_code(),
                    error = %err,
                    "Command handler failed"
                );
                RouteOutcome::Failed(err.to_string())
            }
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(&normalize(name))
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<HandlerDescriptor> {
        self.bindings
            .get(&normalize(name))
            .map(|entry| entry.descriptor.clone())
    }

    /// Bound command names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
