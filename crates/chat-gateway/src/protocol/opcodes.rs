//! Gateway operation codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value of the `op` field of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    /// Sent by both sides; from the server it asks for an immediate beat
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    /// Server asks the client to reconnect and resume
    Reconnect = 7,
    RequestGuildMembers = 8,
    /// `d` says whether the session may be resumed
    InvalidSession = 9,
    /// First frame on every connection, carries the heartbeat interval
    Hello = 10,
    HeartbeatAck = 11,
}

/// Which side of the connection may send an op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Both,
}

impl OpCode {
    /// Every known op, in numeric order
    pub const ALL: [Self; 11] = [
        Self::Dispatch,
        Self::Heartbeat,
        Self::Identify,
        Self::PresenceUpdate,
        Self::VoiceStateUpdate,
        Self::Resume,
        Self::Reconnect,
        Self::RequestGuildMembers,
        Self::InvalidSession,
        Self::Hello,
        Self::HeartbeatAck,
    ];

    /// `None` for values the protocol does not define (e.g. 5)
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_u8() == value)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Heartbeat => Direction::Both,
            Self::Identify
            | Self::PresenceUpdate
            | Self::VoiceStateUpdate
            | Self::Resume
            | Self::RequestGuildMembers => Direction::ClientToServer,
            Self::Dispatch | Self::Reconnect | Self::InvalidSession | Self::Hello | Self::HeartbeatAck => {
                Direction::ServerToClient
            }
        }
    }

    #[must_use]
    pub const fn is_client_op(self) -> bool {
        !matches!(self.direction(), Direction::ServerToClient)
    }

    #[must_use]
    pub const fn is_server_op(self) -> bool {
        !matches!(self.direction(), Direction::ClientToServer)
    }

    /// Ops only the session driver may send
    #[must_use]
    pub const fn is_handshake_op(self) -> bool {
        matches!(self, Self::Identify | Self::Resume)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(value)
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::try_from(raw).map_err(|op| serde::de::Error::custom(format!("unknown op {op}")))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}
