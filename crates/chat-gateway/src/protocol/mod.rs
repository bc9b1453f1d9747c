//! Gateway protocol definitions
//!
//! Defines the wire protocol including op codes, frame formats, and close codes.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;
mod voice_close_codes;

pub use close_codes::{
    CloseClassification, CloseCodeClassifier, CloseKind, GatewayCloseCodes, UNKNOWN_CLOSE_MESSAGE,
};
pub use messages::GatewayMessage;
pub use opcodes::{Direction, OpCode};
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload, VoiceStateUpdatePayload,
};
pub use voice_close_codes::VoiceCloseCodes;
