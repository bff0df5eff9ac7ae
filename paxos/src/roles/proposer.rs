//! Phase-1/2 initiation on behalf of a user-level request. See `SPEC_FULL.md` §4.1.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use slog::{debug, o, Logger};

use crate::decree::{is_decree_equal, Decree, DecreeType, MapDecreeKey};
use crate::ledger::Ledger;
use crate::message::{Message, MessageType};
use crate::pause::{NoPause, Pause};
use crate::replica::{Replica, ReplicaSet};
use crate::storage::Field;
use crate::transport::Sender;

/// Holds all proposer-role state for one replica.
///
/// Owns its `Sender` (rather than receiving one per handler call) because a `RandomPause` retry
/// runs on a background thread after the handler that triggered it has already returned, so the
/// broadcast it eventually performs needs a sender with a `'static` lifetime.
pub struct ProposerContext {
    legislator: Replica,
    ledger: Arc<Ledger>,
    replicaset: Arc<Mutex<ReplicaSet>>,
    highest_proposed_decree: Field<Decree>,
    sender: Arc<dyn Sender>,
    in_progress: AtomicBool,
    promise_map: Mutex<BTreeMap<MapDecreeKey, ReplicaSet>>,
    nack_map: Mutex<BTreeMap<MapDecreeKey, ReplicaSet>>,
    requested_values: Mutex<VecDeque<(Vec<u8>, DecreeType)>>,
    pause: Arc<dyn Pause>,
    logger: Logger,
}

impl ProposerContext {
    pub fn new(
        legislator: Replica,
        ledger: Arc<Ledger>,
        replicaset: Arc<Mutex<ReplicaSet>>,
        highest_proposed_decree: Field<Decree>,
        sender: Arc<dyn Sender>,
    ) -> Self {
        Self::with_pause_and_logger(
            legislator,
            ledger,
            replicaset,
            highest_proposed_decree,
            sender,
            Arc::new(NoPause),
            Logger::root(slog::Discard, o!()),
        )
    }

    pub fn with_pause_and_logger(
        legislator: Replica,
        ledger: Arc<Ledger>,
        replicaset: Arc<Mutex<ReplicaSet>>,
        highest_proposed_decree: Field<Decree>,
        sender: Arc<dyn Sender>,
        pause: Arc<dyn Pause>,
        logger: Logger,
    ) -> Self {
        Self {
            legislator,
            ledger,
            replicaset,
            highest_proposed_decree,
            sender,
            in_progress: AtomicBool::new(false),
            promise_map: Mutex::new(BTreeMap::new()),
            nack_map: Mutex::new(BTreeMap::new()),
            requested_values: Mutex::new(VecDeque::new()),
            pause,
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

    fn quorum_size(&self) -> usize {
        self.replicaset.lock().expect("replicaset lock poisoned").quorum_size()
    }

    /// Never reuses a number below either the durable `highest_proposed_decree` or the ledger's
    /// own tail, so a proposer recovering from a stale snapshot still respects monotonicity.
    fn next_round_number(&self) -> i64 {
        let highest = self.highest_proposed_decree.get().unwrap_or_default().number;
        let ledger_tail = self.ledger.tail().map(|d| d.number).unwrap_or(0);
        highest.max(ledger_tail) + 1
    }

    /// Opens a fresh round: a brand-new `number`/`root_number`, written durably before the
    /// prepare leaves this replica.
    fn open_round(&self) {
        let number = self.next_round_number();
        self.broadcast_prepare(Decree::new(self.legislator.clone(), number, Vec::new(), DecreeType::UserDecree));
    }

    /// Re-issues prepare for a retry of the *same* logical request: `number`/`root_number` are
    /// supplied by the caller (the retry policy decides both).
    fn broadcast_prepare(&self, round: Decree) {
        self.highest_proposed_decree
            .put(round.clone())
            .expect("durable write of highest_proposed_decree failed");
        let prepare = Message::new(round, self.legislator.clone(), self.legislator.clone(), MessageType::PrepareMessage);
        self.sender.reply_all(prepare, &self.members());
    }

    /// Ingestion point: queue the request and, if idle, kick off phase 1.
    pub fn handle_request(&self, message: &Message) {
        self.requested_values
            .lock()
            .expect("requested_values lock poisoned")
            .push_back((message.decree.content.clone(), message.decree.decree_type));

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.open_round();
        }
    }

    /// A promise for our current round. On quorum, pops the next pending value and moves to
    /// phase 2.
    pub fn handle_promise(&self, message: &Message) {
        let current_round = match self.highest_proposed_decree.get() {
            Ok(d) => d,
            Err(_) => return,
        };
        if !is_decree_equal(&message.decree, &current_round) {
            debug!(self.logger, "dropping promise for a stale round";
                "round" => current_round.number, "promise_round" => message.decree.number);
            return;
        }

        let quorum = self.quorum_size();
        // Fire only on the transition into quorum, not on every promise at or past it: once
        // `size()` has reached `quorum`, a later (or replayed) promise for the same round must
        // not pop another queued value and broadcast a second accept under this round's number.
        let reached = {
            let mut promise_map = self.promise_map.lock().expect("promise_map lock poisoned");
            let responders = promise_map.entry(MapDecreeKey(current_round.clone())).or_default();
            let before = responders.size();
            responders.add(message.from.clone());
            before < quorum && responders.size() >= quorum
        };

        if reached {
            let next_value = self.requested_values.lock().expect("requested_values lock poisoned").pop_front();
            if let Some((content, decree_type)) = next_value {
                let accept_decree = Decree::retry(
                    self.legislator.clone(),
                    current_round.number,
                    current_round.root_number,
                    content,
                    decree_type,
                );
                let accept = Message::new(accept_decree, self.legislator.clone(), self.legislator.clone(), MessageType::AcceptMessage);
                self.sender.reply_all(accept, &self.members());
            }
        }
    }

    /// A prepare collided with an equal-or-higher promise at the acceptor.
    pub fn handle_nack_tie(&self, message: &Message) {
        self.record_nack_and_maybe_retry(message);
    }

    /// An accept was rejected because the acceptor's promise advanced.
    pub fn handle_nack(&self, message: &Message) {
        self.record_nack_and_maybe_retry(message);
    }

    fn record_nack_and_maybe_retry(&self, message: &Message) {
        let current_round = match self.highest_proposed_decree.get() {
            Ok(d) => d,
            Err(_) => return,
        };

        let quorum = self.quorum_size();
        // Same transition-only gating as `handle_promise`: past the first time a round's nacks
        // reach quorum, further nacks (or a replay) must not re-schedule another retry.
        let reached = {
            let mut nack_map = self.nack_map.lock().expect("nack_map lock poisoned");
            let responders = nack_map.entry(MapDecreeKey(current_round.clone())).or_default();
            let before = responders.size();
            responders.add(message.from.clone());
            before < quorum && responders.size() >= quorum
        };

        if reached {
            // The nacking acceptor's own promised_decree is echoed back in `message.decree`;
            // skip ahead of it so the retry isn't immediately nacked again.
            let new_number = message.decree.number.max(current_round.number) + 1;
            let root_number = current_round.root_number;
            let legislator = self.legislator.clone();
            let highest_proposed_decree = self.highest_proposed_decree.clone();
            let sender = self.sender.clone();
            let members = self.members();
            let logger = self.logger.clone();
            self.pause.start(Box::new(move || {
                debug!(logger, "retrying round after nack quorum";
                    "new_number" => new_number, "root_number" => root_number);
                let round = Decree::retry(legislator.clone(), new_number, root_number, Vec::new(), DecreeType::UserDecree);
                highest_proposed_decree
                    .put(round.clone())
                    .expect("durable write of highest_proposed_decree failed");
                let prepare = Message::new(round, legislator.clone(), legislator, MessageType::PrepareMessage);
                sender.reply_all(prepare, &members);
            }));
        }
    }

    /// Signals that it is safe to continue the round chain: if another value is queued, keep
    /// `in_progress` set and open the next round's phase 1; otherwise release the single-flight
    /// guard. Does not pop `requested_values` itself — the value that eventually rides this new
    /// round's accept phase is popped later, in `handle_promise`, once that round reaches quorum.
    pub fn handle_resume(&self, _message: &Message) {
        let has_more = !self
            .requested_values
            .lock()
            .expect("requested_values lock poisoned")
            .is_empty();

        if has_more {
            self.open_round();
        } else {
            self.in_progress.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn pending_request_count(&self) -> usize {
        self.requested_values.lock().expect("requested_values lock poisoned").len()
    }
}
