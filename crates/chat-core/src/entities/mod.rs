//! Platform entities read by the client

mod interaction;
mod message;
mod user;

pub use interaction::{Interaction, InteractionData, InteractionMember, InteractionType};
pub use message::Message;
pub use user::User;
