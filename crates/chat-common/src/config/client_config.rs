//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use chat_core::Intents;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub auth: AuthConfig,
    pub gateway: GatewaySettings,
    pub api: ApiSettings,
    pub reconnect: ReconnectSettings,
    pub commands: CommandSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Environment named by `APP_ENV`, loading `.env` first
    ///
    /// Lets the binary pick its tracing preset before the rest of the
    /// configuration is read.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_var(env::var("APP_ENV"))
    }

    fn from_var(raw: Result<String, env::VarError>) -> Self {
        raw.ok().and_then(|s| Self::parse(&s)).unwrap_or_default()
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Credentials and identity
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub token: String,
    #[serde(default)]
    pub intents: Intents,
}

// Keep the token out of logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .finish()
    }
}

/// Gateway endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_api_version")]
    pub version: u8,
    #[serde(default)]
    pub large_threshold: Option<u16>,
}

impl GatewaySettings {
    /// Connection URL with version and encoding query parameters
    #[must_use]
    pub fn connect_url(&self) -> String {
        format!(
            "{}/?v={}&encoding=json",
            self.url.trim_end_matches('/'),
            self.version
        )
    }
}

/// REST endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default = "default_api_version")]
    pub version: u8,
}

impl ApiSettings {
    /// Versioned REST base URL, e.g. `https://host/api/v10`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}/v{}", self.url.trim_end_matches('/'), self.version)
    }
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_reconnect_base_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub max_delay_ms: u64,
    /// `None` retries forever
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_attempts: Option<u32>,
}

impl ReconnectSettings {
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_reconnect_base_ms(),
            max_delay_ms: default_reconnect_max_ms(),
            max_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Command routing settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandSettings {
    /// Prefix for text commands (e.g. `!`); `None` disables them
    #[serde(default)]
    pub prefix: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "chat-bot".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_api_url() -> String {
    "https://discord.com/api".to_string()
}

fn default_api_version() -> u8 {
    10
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    60_000
}

#[allow(clippy::unnecessary_wraps)]
fn default_max_reconnect_attempts() -> Option<u32> {
    Some(10)
}

/// Read and parse an optional variable, rejecting values that fail to parse
fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

impl ClientConfig {
    /// Build a configuration from a token with every other setting defaulted
    #[must_use]
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            auth: AuthConfig {
                token: token.into(),
                intents,
            },
            gateway: GatewaySettings {
                url: default_gateway_url(),
                version: default_api_version(),
                large_threshold: None,
            },
            api: ApiSettings {
                url: default_api_url(),
                version: default_api_version(),
            },
            reconnect: ReconnectSettings::default(),
            commands: CommandSettings::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHAT_TOKEN` is missing or a variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("CHAT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CHAT_TOKEN"))?;

        let intents = match env::var("CHAT_INTENTS") {
            Ok(raw) => Intents::parse(&raw).map_err(|_| ConfigError::InvalidValue("CHAT_INTENTS", raw))?,
            Err(_) => Intents::default(),
        };

        let api_version = parse_var("CHAT_API_VERSION")?.unwrap_or_else(default_api_version);

        // 0 means retry forever
        let max_attempts = match parse_var::<u32>("CHAT_MAX_RECONNECT_ATTEMPTS")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => default_max_reconnect_attempts(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: Environment::from_var(env::var("APP_ENV")),
            },
            auth: AuthConfig { token, intents },
            gateway: GatewaySettings {
                url: env::var("CHAT_GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                version: api_version,
                large_threshold: parse_var("CHAT_LARGE_THRESHOLD")?,
            },
            api: ApiSettings {
                url: env::var("CHAT_API_URL").unwrap_or_else(|_| default_api_url()),
                version: api_version,
            },
            reconnect: ReconnectSettings {
                base_delay_ms: parse_var("CHAT_RECONNECT_BASE_MS")?
                    .unwrap_or_else(default_reconnect_base_ms),
                max_delay_ms: parse_var("CHAT_RECONNECT_MAX_MS")?
                    .unwrap_or_else(default_reconnect_max_ms),
                max_attempts,
            },
            commands: CommandSettings {
                prefix: env::var("CHAT_COMMAND_PREFIX")
                    .ok()
                    .filter(|p| !p.is_empty()),
            },
        })
    }

    /// Check invariants that env parsing alone cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token.trim().is_empty() {
            return Err(ConfigError::MissingVar("CHAT_TOKEN"));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_RECONNECT_BASE_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::InvalidValue(
                "CHAT_RECONNECT_MAX_MS",
                format!("must be at least {}", self.reconnect.base_delay_ms),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
