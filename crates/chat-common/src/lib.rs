//! # chat-common
//!
//! Shared utilities including configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ApiSettings, AppSettings, AuthConfig, ClientConfig, CommandSettings, ConfigError, Environment,
    GatewaySettings, ReconnectSettings,
};
pub use error::{ClientError, ClientResult};
pub use telemetry::{init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
