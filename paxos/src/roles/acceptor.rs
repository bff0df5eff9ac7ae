//! Durable promise/accept bookkeeping that enforces the Paxos safety rules. See `SPEC_FULL.md` §4.2.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use slog::{debug, info, o, Logger};

use crate::decree::{is_decree_equal, is_decree_higher_or_equal, Decree, DecreeType};
use crate::message::{Message, MessageType};
use crate::replica::{Replica, ReplicaSet};
use crate::storage::Field;
use crate::transport::Sender;
use crate::util::defaults::ACCEPTOR_LEASE_WINDOW;
use crate::util::LogicalClock;

/// Holds all acceptor-role state for one replica.
pub struct AcceptorContext {
    replicaset: Arc<Mutex<ReplicaSet>>,
    promised_decree: Field<Decree>,
    accepted_decree: Field<Decree>,
    lease: Mutex<LogicalClock>,
    sender: Arc<dyn Sender>,
    logger: Logger,
}

impl AcceptorContext {
    pub fn new(
        replicaset: Arc<Mutex<ReplicaSet>>,
        promised_decree: Field<Decree>,
        accepted_decree: Field<Decree>,
        sender: Arc<dyn Sender>,
    ) -> Self {
        Self::with_lease_and_logger(
            replicaset,
            promised_decree,
            accepted_decree,
            sender,
            ACCEPTOR_LEASE_WINDOW,
            Logger::root(slog::Discard, o!()),
        )
    }

    pub fn with_lease_and_logger(
        replicaset: Arc<Mutex<ReplicaSet>>,
        promised_decree: Field<Decree>,
        accepted_decree: Field<Decree>,
        sender: Arc<dyn Sender>,
        lease_window: Duration,
        logger: Logger,
    ) -> Self {
        // Touch both durable cells eagerly so a missing/corrupt store fails at construction
        // time rather than on the first inbound prepare.
        let _ = promised_decree.get();
        let _ = accepted_decree.get();
        Self {
            replicaset,
            promised_decree,
            accepted_decree,
            lease: Mutex::new(LogicalClock::with(lease_window)),
            sender,
            logger,
        }
    }

    fn members(&self) -> Vec<Replica> {
        self.replicaset
            .lock()
            .expect("replicaset lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn promised(&self) -> Decree {
        self.promised_decree.get().unwrap_or_default()
    }

    fn accepted(&self) -> Decree {
        self.accepted_decree.get().unwrap_or_default()
    }

    /// Phase 1. A prepare that ties the current promise but comes from a different author is a
    /// genuine collision (`NackTieMessage`); a prepare strictly lower than the promise is stale
    /// (`NackMessage`, echoing the current promise so the proposer can skip ahead); everything
    /// else advances the promise and echoes back whichever of the incoming prepare or the
    /// current accepted value is higher, so the proposer learns of any already-accepted value.
    pub fn handle_prepare(&self, message: &Message) {
        self.lease.lock().expect("lease clock poisoned").reset();

        let promised = self.promised();
        if is_decree_equal(&message.decree, &promised) && message.decree.author != promised.author {
            debug!(self.logger, "nacking tied prepare from a different author";
                "round" => promised.number, "incumbent" => %promised.author, "challenger" => %message.decree.author);
            let nack_tie = Message::new(promised, message.to.clone(), message.from.clone(), MessageType::NackTieMessage);
            self.sender.reply(nack_tie);
            return;
        }

        if !is_decree_higher_or_equal(&message.decree, &promised) {
            debug!(self.logger, "nacking stale prepare"; "promised" => promised.number, "received" => message.decree.number);
            let nack = Message::new(promised, message.to.clone(), message.from.clone(), MessageType::NackMessage);
            self.sender.reply(nack);
            return;
        }

        self.promised_decree
            .put(message.decree.clone())
            .expect("durable write of promised_decree failed");

        let accepted = self.accepted();
        let echoed = if is_decree_higher_or_equal(&accepted, &message.decree) {
            accepted
        } else {
            message.decree.clone()
        };
        let promise = Message::new(echoed, message.to.clone(), message.from.clone(), MessageType::PromiseMessage);
        self.sender.reply(promise);
    }

    /// Phase 2. Accepts only if the incoming decree is still at or above the current promise;
    /// broadcasts `AcceptedMessage` to the full membership (not just the proposer) so the
    /// learner on every replica can track the quorum.
    pub fn handle_accept(&self, message: &Message) {
        let promised = self.promised();
        if !is_decree_higher_or_equal(&message.decree, &promised) {
            debug!(self.logger, "nacking accept below promise"; "promised" => promised.number, "received" => message.decree.number);
            let nack = Message::new(promised, message.to.clone(), message.from.clone(), MessageType::NackMessage);
            self.sender.reply(nack);
            return;
        }

        let accepted = self.accepted();
        let highest = if is_decree_higher_or_equal(&accepted, &message.decree) {
            accepted
        } else {
            message.decree.clone()
        };
        self.accepted_decree
            .put(highest.clone())
            .expect("durable write of accepted_decree failed");

        let accepted_message = Message::new(highest, message.to.clone(), Replica::default(), MessageType::AcceptedMessage);
        self.sender.reply_all(accepted_message, &self.members());
    }

    /// Driven by the embedding application's timer (or a background thread `Parliament` may
    /// spawn). `elapsed` is the wall-clock time since the previous call. If the lease expires
    /// without an intervening prepare resetting it, the promise is rolled back to the accepted
    /// value so a stalled round doesn't block progress forever.
    pub fn handle_cleanup(&self, elapsed: Duration) {
        let expired = self
            .lease
            .lock()
            .expect("lease clock poisoned")
            .tick_and_check_timeout(elapsed);
        if !expired {
            return;
        }

        let accepted = self.accepted();
        info!(self.logger, "acceptor lease expired, resetting promise"; "reset_to" => accepted.number);
        self.promised_decree
            .put(accepted)
            .expect("durable write of promised_decree failed");
    }
}
