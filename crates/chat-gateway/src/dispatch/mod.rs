//! Event and command dispatch
//!
//! Maps inbound dispatch events to registered handlers and command
//! invocations to their single bound handler.

mod collector;
mod error;
mod handler;
mod registry;
mod router;

pub use collector::{Module, Registration, RegistrationCollector};
pub use error::DispatchError;
pub(crate) use error::panic_message;
pub use handler::{
    CommandContext, CommandHandler, EventContext, FnCommand, HandlerDescriptor, HandlerKind,
    HandlerResult, InvocationSource, ParamShape,
};
pub use registry::{DispatchSummary, EventBinding, EventDispatchRegistry};
pub use router::{CommandBinding, CommandRouter, RouteOutcome};
