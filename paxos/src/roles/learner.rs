//! Accept-quorum tracking, gap detection, and ledger hand-off. See `SPEC_FULL.md` §4.3.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use slog::{debug, o, Logger};

use crate::decree::{is_root_decree_ordered, AscendingDecree, Decree, MapDecreeKey};
use crate::ledger::Ledger;
use crate::message::{Message, MessageType};
use crate::replica::{Replica, ReplicaSet};
use crate::transport::Sender;

/// Holds all learner-role state for one replica.
pub struct LearnerContext {
    legislator: Replica,
    replicaset: Arc<Mutex<ReplicaSet>>,
    ledger: Arc<Ledger>,
    accepted_map: Mutex<BTreeMap<MapDecreeKey, ReplicaSet>>,
    tracked_future_decrees: Mutex<BinaryHeap<Reverse<AscendingDecree>>>,
    is_observer: AtomicBool,
    sender: Arc<dyn Sender>,
    logger: Logger,
}

impl LearnerContext {
    pub fn new(legislator: Replica, replicaset: Arc<Mutex<ReplicaSet>>, ledger: Arc<Ledger>, sender: Arc<dyn Sender>) -> Self {
        Self::with_logger(legislator, replicaset, ledger, sender, Logger::root(slog::Discard, o!()))
    }

    pub fn with_logger(
        legislator: Replica,
        replicaset: Arc<Mutex<ReplicaSet>>,
        ledger: Arc<Ledger>,
        sender: Arc<dyn Sender>,
        logger: Logger,
    ) -> Self {
        Self {
            legislator,
            replicaset,
            ledger,
            accepted_map: Mutex::new(BTreeMap::new()),
            tracked_future_decrees: Mutex::new(BinaryHeap::new()),
            is_observer: AtomicBool::new(false),
            sender,
            logger,
        }
    }

    fn members(&self) -> ReplicaSet {
        self.replicaset.lock().expect("replicaset lock poisoned").clone()
    }

    fn quorum_size(&self) -> usize {
        self.replicaset.lock().expect("replicaset lock poisoned").quorum_size()
    }

    pub fn set_active(&self) {
        self.is_observer.store(false, Ordering::SeqCst);
    }

    pub fn set_inactive(&self) {
        self.is_observer.store(true, Ordering::SeqCst);
    }

    pub fn is_observer(&self) -> bool {
        self.is_observer.load(Ordering::SeqCst)
    }

    /// An `Accepted` from a cluster member. Unknown senders are ignored (unknown-peer isolation
    /// is primarily the `Receiver`'s job, but the check is cheap to repeat here).
    pub fn handle_accepted(&self, message: &Message) {
        if !self.members().contains(&message.from) {
            debug!(self.logger, "ignoring accepted from unknown replica"; "from" => %message.from);
            return;
        }

        let quorum = self.quorum_size();
        let reached = {
            let mut accepted_map = self.accepted_map.lock().expect("accepted_map lock poisoned");
            let responders = accepted_map.entry(MapDecreeKey(message.decree.clone())).or_default();
            responders.add(message.from.clone());
            responders.size() >= quorum
        };

        if reached {
            self.gap_or_append(message.decree.clone());
        }
    }

    /// A peer's reply to an earlier `UpdateMessage`. Already represents a decided value (no
    /// quorum check needed), so it goes straight into the shared append-or-park core.
    pub fn handle_updated(&self, message: &Message) {
        self.gap_or_append(message.decree.clone());
    }

    /// Appends `decree` if it is the ledger's next contiguous entry (by root-number), then drains
    /// any parked future decrees that have become contiguous in turn. If `decree` is still ahead
    /// of the ledger, parks it and asks the cluster for the missing range. An observer never
    /// appends — it only tracks, so that a replica temporarily excluded from quorum doesn't
    /// silently diverge its ledger.
    fn gap_or_append(&self, decree: Decree) {
        let tail = self.ledger.tail();
        let is_next = match &tail {
            Some(tail) => is_root_decree_ordered(tail, &decree),
            None => decree.root_number == 1,
        };

        if is_next {
            if self.is_observer() {
                debug!(self.logger, "observer tracked contiguous decree without appending"; "root_number" => decree.root_number);
                return;
            }
            let author = decree.author.clone();
            self.ledger.append(decree);
            self.notify_resume_if_self_authored(&author);
            self.drain_contiguous_future_decrees();
            return;
        }

        let is_ahead = match &tail {
            Some(tail) => decree.root_number > tail.root_number + 1,
            None => decree.root_number > 1,
        };
        if is_ahead {
            self.park_and_request_update(decree);
        } else {
            debug!(self.logger, "dropping already-known decree"; "root_number" => decree.root_number);
        }
    }

    fn drain_contiguous_future_decrees(&self) {
        loop {
            let tail = match self.ledger.tail() {
                Some(tail) => tail,
                None => return,
            };
            let next = {
                let mut heap = self.tracked_future_decrees.lock().expect("tracked_future_decrees lock poisoned");
                match heap.peek() {
                    Some(Reverse(AscendingDecree(candidate))) if is_root_decree_ordered(&tail, candidate) => {
                        heap.pop().map(|Reverse(AscendingDecree(d))| d)
                    }
                    _ => None,
                }
            };
            match next {
                Some(decree) => {
                    let author = decree.author.clone();
                    self.ledger.append(decree);
                    self.notify_resume_if_self_authored(&author);
                }
                None => return,
            }
        }
    }

    /// Unblocks this replica's own proposer once one of its rounds has actually landed in the
    /// ledger. Must only fire for a decree this replica authored: resuming on an unrelated
    /// append would let the proposer open its next round while its own in-flight accept is
    /// still outstanding, losing the popped `requested_values` entry riding that round.
    fn notify_resume_if_self_authored(&self, author: &Replica) {
        if *author != self.legislator {
            return;
        }
        let resume = Message::new(
            Decree::default(),
            self.legislator.clone(),
            self.legislator.clone(),
            MessageType::ResumeMessage,
        );
        self.sender.reply(resume);
    }

    fn park_and_request_update(&self, decree: Decree) {
        let root_number = decree.root_number;
        self.tracked_future_decrees
            .lock()
            .expect("tracked_future_decrees lock poisoned")
            .push(Reverse(AscendingDecree(decree)));

        let tail = self.ledger.tail().unwrap_or_default();
        debug!(self.logger, "parked future decree, requesting update"; "root_number" => root_number, "our_root_number" => tail.root_number);

        let recipients: Vec<Replica> = self.members().iter().cloned().filter(|r| *r != self.legislator).collect();
        let request = Message::new(tail, self.legislator.clone(), self.legislator.clone(), MessageType::UpdateMessage);
        self.sender.reply_all(request, &recipients);
    }

    /// For every decree within the last `max_n` root-numbered positions that this learner has
    /// tracked at least one `Accepted` for, the set of members that have not. Deliberately keyed
    /// off `accepted_map` rather than the committed ledger: a decree stuck short of quorum is
    /// exactly the case an operator calls this to diagnose, so it must show up here before it
    /// ever reaches `Ledger::append`.
    pub fn get_absentee_ballots(&self, max_n: usize) -> Vec<(Decree, ReplicaSet)> {
        let members = self.members();
        let last_root = self.ledger.tail().map(|d| d.root_number).unwrap_or(0);
        let start = last_root - max_n as i64 + 1;
        self.accepted_map
            .lock()
            .expect("accepted_map lock poisoned")
            .iter()
            .filter(|(key, _)| key.0.root_number >= start)
            .map(|(key, responders)| (key.0.clone(), members.difference(responders)))
            .collect()
    }
}
