//! Dispatch event names the client itself reacts to

use std::fmt;

/// Well-known values of a dispatch frame's `t` field
///
/// Handlers are keyed by the raw string, so names missing here still reach
/// them; this enum only covers events the session or router inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Ready,
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildMembersChunk,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    /// Carries slash commands as well as components and modals
    InteractionCreate,
    PresenceUpdate,
    VoiceStateUpdate,
    VoiceServerUpdate,
}

const NAMES: [(GatewayEventType, &str); 13] = [
    (GatewayEventType::Ready, "READY"),
    (GatewayEventType::Resumed, "RESUMED"),
    (GatewayEventType::GuildCreate, "GUILD_CREATE"),
    (GatewayEventType::GuildUpdate, "GUILD_UPDATE"),
    (GatewayEventType::GuildDelete, "GUILD_DELETE"),
    (GatewayEventType::GuildMembersChunk, "GUILD_MEMBERS_CHUNK"),
    (GatewayEventType::MessageCreate, "MESSAGE_CREATE"),
    (GatewayEventType::MessageUpdate, "MESSAGE_UPDATE"),
    (GatewayEventType::MessageDelete, "MESSAGE_DELETE"),
    (GatewayEventType::InteractionCreate, "INTERACTION_CREATE"),
    (GatewayEventType::PresenceUpdate, "PRESENCE_UPDATE"),
    (GatewayEventType::VoiceStateUpdate, "VOICE_STATE_UPDATE"),
    (GatewayEventType::VoiceServerUpdate, "VOICE_SERVER_UPDATE"),
];

impl GatewayEventType {
    /// Wire name, e.g. `MESSAGE_CREATE`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        NAMES
            .iter()
            .find_map(|(event, name)| (*event == self).then_some(*name))
            .unwrap_or_default()
    }

    /// Exact, case-sensitive match on the wire name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find_map(|(event, known)| (*known == name).then_some(*event))
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
