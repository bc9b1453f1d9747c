//! Frame fixtures
//!
//! Server-side frames and payloads reused across scenario tests.

use chat_gateway::protocol::{GatewayMessage, HelloPayload};
use chat_gateway::GatewayConfig;
use serde_json::{json, Value};
use std::time::Duration;

/// Token every test session identifies with
pub const TEST_TOKEN: &str = "test-token";

/// Gateway URL the in-memory connector is configured with
pub const TEST_GATEWAY_URL: &str = "ws://gateway.test";

/// Config with fast, deterministic-enough timings for paused-clock tests
pub fn test_config() -> GatewayConfig {
    GatewayConfig::new(TEST_GATEWAY_URL)
        .with_reconnect(Duration::from_secs(1), Duration::from_secs(60), Some(5))
        .with_close_timeout(Duration::from_millis(200))
}

pub fn hello(interval_ms: u64) -> GatewayMessage {
    GatewayMessage::hello(HelloPayload::with_interval(interval_ms))
}

/// READY with a session id and no resume URL
pub fn ready(session_id: &str, seq: u64) -> GatewayMessage {
    ready_with_resume_url(session_id, seq, None)
}

pub fn ready_with_resume_url(session_id: &str, seq: u64, resume_url: Option<&str>) -> GatewayMessage {
    let mut payload = json!({
        "v": 10,
        "user": {"id": "100", "username": "test-bot", "bot": true},
        "guilds": [{"id": "200", "unavailable": true}],
        "session_id": session_id,
    });
    if let Some(url) = resume_url {
        payload["resume_gateway_url"] = Value::String(url.to_string());
    }
    GatewayMessage::dispatch("READY", seq, payload)
}

pub fn resumed(seq: u64) -> GatewayMessage {
    GatewayMessage::dispatch("RESUMED", seq, Value::Null)
}

pub fn dispatch(event: &str, seq: u64, payload: Value) -> GatewayMessage {
    GatewayMessage::dispatch(event, seq, payload)
}

/// Application-command interaction payload
pub fn slash_command(name: &str) -> Value {
    json!({
        "id": "300",
        "application_id": "400",
        "type": 2,
        "token": "interaction-token",
        "guild_id": "200",
        "channel_id": "500",
        "member": {"user": {"id": "600", "username": "alice"}},
        "data": {"id": "700", "name": name, "options": []}
    })
}

/// MESSAGE_CREATE payload
pub fn message(content: &str, bot: bool) -> Value {
    json!({
        "id": "800",
        "channel_id": "500",
        "guild_id": "200",
        "author": {"id": "600", "username": "alice", "bot": bot},
        "content": content,
    })
}
