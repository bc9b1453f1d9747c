//! Gateway session configuration
//!
//! Passed to [`GatewaySession`](crate::GatewaySession) at construction.

use crate::protocol::{IdentifyProperties, PresenceUpdatePayload};
use chat_common::ClientConfig;
use std::num::NonZeroU32;
use std::time::Duration;

/// Default gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Default gateway protocol version
pub const DEFAULT_API_VERSION: u8 = 10;

/// Gateway session configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL for fresh connections
    pub gateway_url: String,
    pub api_version: u8,
    pub properties: IdentifyProperties,
    /// Presence sent with identify
    pub presence: Option<PresenceUpdatePayload>,
    pub large_threshold: Option<u16>,
    /// Backoff base delay
    pub reconnect_base: Duration,
    /// Backoff cap
    pub reconnect_max: Duration,
    /// `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    /// Used when a rate-limited close carries no parseable retry-after
    pub default_retry_after: Duration,
    /// Wait range before re-identifying after an invalid session
    pub invalid_session_delay: (Duration, Duration),
    /// Non-heartbeat frames allowed per minute; `None` disables the limit
    pub send_budget: Option<NonZeroU32>,
    /// How long shutdown waits for the writer and dispatch worker to finish
    pub close_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_version: DEFAULT_API_VERSION,
            properties: IdentifyProperties::default(),
            presence: None,
            large_threshold: None,
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
            max_reconnect_attempts: Some(10),
            default_retry_after: Duration::from_secs(5),
            invalid_session_delay: (Duration::from_secs(1), Duration::from_secs(5)),
            send_budget: NonZeroU32::new(120),
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn with_large_threshold(mut self, threshold: u16) -> Self {
        self.large_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, base: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        self.reconnect_base = base;
        self.reconnect_max = max;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_default_retry_after(mut self, retry_after: Duration) -> Self {
        self.default_retry_after = retry_after;
        self
    }

    #[must_use]
    pub fn with_invalid_session_delay(mut self, min: Duration, max: Duration) -> Self {
        self.invalid_session_delay = (min, max.max(min));
        self
    }

    /// `0` disables the outbound send budget
    #[must_use]
    pub fn with_send_budget(mut self, per_minute: u32) -> Self {
        self.send_budget = NonZeroU32::new(per_minute);
        self
    }

    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Connection URL for a base endpoint, with version and encoding
    #[must_use]
    pub fn connect_url(&self, base: &str) -> String {
        format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            self.api_version
        )
    }
}

impl From<&ClientConfig> for GatewayConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            gateway_url: config.gateway.url.clone(),
            api_version: config.gateway.version,
            large_threshold: config.gateway.large_threshold,
            reconnect_base: config.reconnect.base_delay(),
            reconnect_max: config.reconnect.max_delay(),
            max_reconnect_attempts: config.reconnect.max_attempts,
            ..Self::default()
        }
    }
}
