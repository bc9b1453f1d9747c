//! Subscriber setup for binaries built on the client
//!
//! Library crates only emit `tracing` events; installing a subscriber is left
//! to the application, usually through [`TracingConfig::try_init`].

use crate::config::Environment;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Socket crates log every frame at debug; keep them quiet unless asked
const QUIET_DEPENDENCIES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "hyper=warn", "reqwest=warn"];

/// Subscriber options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// One JSON object per line
    pub json: bool,
    /// Log span open/close
    pub span_events: bool,
    /// File and line of each event
    pub source_location: bool,
    pub target: bool,
    /// Extra `EnvFilter` directives, e.g. `chat_gateway::session=trace`
    pub directives: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            source_location: false,
            target: true,
            directives: Vec::new(),
        }
    }
}

impl TracingConfig {
    /// Debug level with span events and source locations
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            source_location: true,
            ..Self::default()
        }
    }

    /// JSON lines for log shippers
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Filter string applied when `RUST_LOG` is unset
    #[must_use]
    pub fn default_filter(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        std::iter::once(level.as_str())
            .chain(QUIET_DEPENDENCIES.iter().copied())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_filter()))
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_target(self.target)
            .with_span_events(span_events);

        if self.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// Returns [`TracingError::AlreadyInitialized`] if one is already set
    pub fn try_init(self) -> Result<(), TracingError> {
        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(self.fmt_layer())
            .try_init()
            .map_err(|_| TracingError::AlreadyInitialized)
    }
}

/// Install the default subscriber, ignoring one that is already set
pub fn init_tracing() {
    let _ = TracingConfig::default().try_init();
}

/// Install a subscriber for `config`
///
/// # Errors
/// Returns [`TracingError::AlreadyInitialized`] if one is already set
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    config.try_init()
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
