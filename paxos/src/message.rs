//! The wire message envelope shared by every role.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decree::Decree;
use crate::replica::Replica;

/// The tag identifying a [`Message`]'s purpose; determines which role handlers receive it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MessageType {
    #[default]
    InvalidMessage,
    RequestMessage,
    PrepareMessage,
    PromiseMessage,
    NackTieMessage,
    AcceptMessage,
    NackMessage,
    AcceptedMessage,
    ResumeMessage,
    UpdateMessage,
    UpdatedMessage,
}

/// `{from, to, type, decree}` — the only structure carried over the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    pub decree: Decree,
    pub from: Replica,
    pub to: Replica,
    pub message_type: MessageType,
}

impl Message {
    pub fn new(decree: Decree, from: Replica, to: Replica, message_type: MessageType) -> Self {
        Self {
            decree,
            from,
            to,
            message_type,
        }
    }
}

/// Builds a reply to `message`: swaps `from`/`to` and keeps the same decree unless the caller
/// mutates it afterwards.
pub fn response(message: &Message, message_type: MessageType) -> Message {
    Message {
        decree: message.decree.clone(),
        from: message.to.clone(),
        to: message.from.clone(),
        message_type,
    }
}
