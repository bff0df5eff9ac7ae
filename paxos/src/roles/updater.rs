//! Serves catch-up requests from lagging replicas. See `SPEC_FULL.md` §4.5.

use std::sync::Arc;

use crate::ledger::Ledger;
use crate::message::{Message, MessageType};
use crate::transport::Sender;

/// Holds the (read-only) updater-role state for one replica: just the shared ledger.
pub struct UpdaterContext {
    ledger: Arc<Ledger>,
    sender: Arc<dyn Sender>,
}

impl UpdaterContext {
    pub fn new(ledger: Arc<Ledger>, sender: Arc<dyn Sender>) -> Self {
        Self { ledger, sender }
    }

    /// A pull request from a lagging peer's learner. Replies with the entry one past the
    /// requester's root-number if we have it, otherwise with our own ledger tail (which may
    /// still be behind the requester — the requester keeps polling until it isn't).
    pub fn handle_update(&self, message: &Message) {
        let reply_decree = self
            .ledger
            .next(&message.decree)
            .unwrap_or_else(|| self.ledger.tail().unwrap_or_default());

        let updated = Message::new(reply_decree, message.to.clone(), message.from.clone(), MessageType::UpdatedMessage);
        self.sender.reply(updated);
    }
}
