//! The `{op, t, s, d}` frame envelope

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload, VoiceStateUpdatePayload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One frame in either direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Event name, dispatch frames only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number, dispatch frames only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event data payload, always present on the wire (`null` when empty)
    #[serde(default)]
    pub d: Option<Value>,
}

impl GatewayMessage {
    /// Frame with neither event name nor sequence
    const fn control(op: OpCode, d: Option<Value>) -> Self {
        Self { op, t: None, s: None, d }
    }

    fn with_data(op: OpCode, data: impl Serialize) -> Self {
        Self::control(op, serde_json::to_value(data).ok().filter(|v| !v.is_null()))
    }

    /// Op 1; `d` is the last sequence seen, or `null`
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::with_data(OpCode::Identify, payload)
    }

    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::with_data(OpCode::Resume, payload)
    }

    #[must_use]
    pub fn presence_update(payload: &PresenceUpdatePayload) -> Self {
        Self::with_data(OpCode::PresenceUpdate, payload)
    }

    #[must_use]
    pub fn voice_state_update(payload: &VoiceStateUpdatePayload) -> Self {
        Self::with_data(OpCode::VoiceStateUpdate, payload)
    }

    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Self {
        Self::with_data(OpCode::RequestGuildMembers, payload)
    }

    // Server-side frames, used by tests and mock gateways

    #[must_use]
    pub fn dispatch(event: impl Into<String>, seq: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event.into()),
            s: Some(seq),
            d: Some(data),
        }
    }

    #[must_use]
    pub fn hello(payload: HelloPayload) -> Self {
        Self::with_data(OpCode::Hello, payload)
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, None)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, None)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    /// Decode `d` into a typed structure; a missing `d` decodes as `null`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.d.clone().unwrap_or(Value::Null))
    }

    /// Decode `d` only when the frame carries `op`
    fn decode_if<T: DeserializeOwned>(&self, op: OpCode) -> Option<T> {
        (self.op == op).then(|| self.decode().ok()).flatten()
    }

    pub fn as_hello(&self) -> Option<HelloPayload> {
        self.decode_if(OpCode::Hello)
    }

    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        self.decode_if(OpCode::Identify)
    }

    pub fn as_resume(&self) -> Option<ResumePayload> {
        self.decode_if(OpCode::Resume)
    }

    /// Outer `None` if this is not a heartbeat, inner `None` for `d: null`
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        (self.op == OpCode::Heartbeat).then(|| self.d.as_ref().and_then(Value::as_u64))
    }

    /// Resumable flag of op 9; a missing `d` means not resumable
    pub fn as_invalid_session_resumable(&self) -> Option<bool> {
        (self.op == OpCode::InvalidSession).then(|| self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op={}", self.op)?;
        if let Some(t) = &self.t {
            write!(f, " t={t}")?;
        }
        if let Some(s) = self.s {
            write!(f, " s={s}")?;
        }
        Ok(())
    }
}
