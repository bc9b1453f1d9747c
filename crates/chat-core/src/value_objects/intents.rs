//! Gateway intents bitflags
//!
//! Intents select which categories of events the gateway delivers to a session.
//! Sent as a plain integer inside the Identify payload.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Gateway intent flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete, role and channel events
        const GUILDS                    = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS             = 1 << 1;
        /// Ban add/remove, audit log entries
        const GUILD_MODERATION          = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EXPRESSIONS         = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS        = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS            = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES             = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES        = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES           = 1 << 8;
        /// Guild message create/update/delete
        const GUILD_MESSAGES            = 1 << 9;
        /// Guild reactions
        const GUILD_MESSAGE_REACTIONS   = 1 << 10;
        /// Guild typing indicators
        const GUILD_MESSAGE_TYPING      = 1 << 11;
        /// Direct message create/update/delete
        const DIRECT_MESSAGES           = 1 << 12;
        /// Direct message reactions
        const DIRECT_MESSAGE_REACTIONS  = 1 << 13;
        /// Direct message typing indicators
        const DIRECT_MESSAGE_TYPING     = 1 << 14;
        /// Message content in message events (privileged)
        const MESSAGE_CONTENT           = 1 << 15;
        /// Scheduled event lifecycle
        const GUILD_SCHEDULED_EVENTS    = 1 << 16;

        /// Everything that does not require privileged approval
        const DEFAULT = Self::GUILDS.bits()
            | Self::GUILD_MODERATION.bits()
            | Self::GUILD_EXPRESSIONS.bits()
            | Self::GUILD_INTEGRATIONS.bits()
            | Self::GUILD_WEBHOOKS.bits()
            | Self::GUILD_INVITES.bits()
            | Self::GUILD_VOICE_STATES.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::GUILD_MESSAGE_REACTIONS.bits()
            | Self::GUILD_MESSAGE_TYPING.bits()
            | Self::DIRECT_MESSAGES.bits()
            | Self::DIRECT_MESSAGE_REACTIONS.bits()
            | Self::DIRECT_MESSAGE_TYPING.bits()
            | Self::GUILD_SCHEDULED_EVENTS.bits();

        /// Intents that must be enabled for the application before use
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();

        /// Every known intent
        const ALL = Self::DEFAULT.bits() | Self::PRIVILEGED.bits();
    }
}

impl Intents {
    /// Whether any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse from a decimal string, dropping unknown bits
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.trim().parse::<u64>().map(Intents::from_bits_truncate)
    }

    /// Names of the individual intents that are set
    pub fn list(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::DEFAULT
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// The gateway expects a JSON number here, unlike snowflakes
impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct IntentsVisitor;

        impl Visitor<'_> for IntentsVisitor {
            type Value = Intents;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or numeric string of intent bits")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Intents, E>
            where
                E: de::Error,
            {
                Ok(Intents::from_bits_truncate(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Intents, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(Intents::from_bits_truncate)
                    .map_err(|_| de::Error::custom("intents cannot be negative"))
            }

            fn visit_str<E>(self, value: &str) -> Result<Intents, E>
            where
                E: de::Error,
            {
                Intents::parse(value).map_err(|_| de::Error::custom("invalid intents string"))
            }
        }

        deserializer.deserialize_any(IntentsVisitor)
    }
}

impl From<u64> for Intents {
    fn from(bits: u64) -> Self {
        Intents::from_bits_truncate(bits)
    }
}

impl From<Intents> for u64 {
    fn from(intents: Intents) -> Self {
        intents.bits()
    }
}
