//! Configuration structs

mod client_config;

pub use client_config::{
    ApiSettings, AppSettings, AuthConfig, ClientConfig, CommandSettings, ConfigError, Environment,
    GatewaySettings, ReconnectSettings,
};
