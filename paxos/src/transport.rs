//! The transport-facing interfaces the role engine is built against.
//!
//! TCP framing, connection pooling, and the bootstrap file-transfer wire format are explicitly
//! out of scope for this crate (see `SPEC_FULL.md` §1/§6): we only specify the contract an
//! embedding application's transport must satisfy. `paxos::parliament` is generic over
//! `Sender`/`Receiver`, and tests drive it with an in-process loopback double
//! (`paxos/tests/common`).

use crate::message::{Message, MessageType};
use crate::replica::Replica;

/// Delivers outbound messages. Implementations must serialize writes per destination (the spec
/// requires this because a single TCP connection carries exactly one message).
pub trait Sender: Send + Sync {
    /// Sends `message` to its `to` replica only.
    fn reply(&self, message: Message);

    /// Sends a copy of `message` (with `to` rewritten per-recipient) to every replica in
    /// `recipients` except, by convention, nobody is excluded — callers that want to exclude
    /// themselves should filter `recipients` first.
    fn reply_all(&self, message: Message, recipients: &[Replica]) {
        for recipient in recipients {
            let mut m = message.clone();
            m.to = recipient.clone();
            self.reply(m);
        }
    }
}

/// A callback invoked for every inbound message of a registered type.
pub type Callback = Box<dyn Fn(Message) + Send + Sync>;

/// Demultiplexes inbound messages by `MessageType` and invokes every callback registered for
/// that type. A message whose `from` is not a known member of the cluster must never reach a
/// registered callback (unknown-peer isolation, `SPEC_FULL.md` §7/§8) — enforcing that is the
/// receiver implementation's responsibility, since only it can consult the membership view
/// before dispatch.
pub trait Receiver: Send + Sync {
    fn register_callback(&mut self, message_type: MessageType, callback: Callback);
}

/// One file transferred as part of bringing a newly-added replica's on-disk state up to date.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BootstrapFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Transfers an existing replica's on-disk state to a newly-added peer.
///
/// The transferred bundle MUST begin with an empty membership file and MUST end with the true
/// one, so the new peer cannot begin participating in quorums until its state is fully
/// installed (`SPEC_FULL.md` §4.6). No network implementation ships in this crate; the embedding
/// application supplies one.
pub trait BootstrapTransfer: Send + Sync {
    fn send_bundle(&self, to: &Replica, files: Vec<BootstrapFile>);
}
