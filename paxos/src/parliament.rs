//! The top-level facade that owns one replica's collaborators and exposes the embedding API.
//! See `SPEC_FULL.md` §2 and §6.

use std::sync::{Arc, Mutex};

use slog::Logger;

use crate::decree::{Decree, DecreeType, UpdateReplicaSetDecree};
use crate::error::PaxosError;
use crate::ledger::Ledger;
use crate::message::{Message, MessageType};
use crate::replica::{Replica, ReplicaSet};
use crate::roles::{register_acceptor, register_learner, register_proposer, register_updater};
use crate::roles::{AcceptorContext, LearnerContext, ProposerContext, UpdaterContext};
use crate::signal::Signal;
use crate::transport::{Receiver, Sender};

/// Builds the `Signal` used by `add_legislator`/`remove_legislator`. Its retry thunk sends an
/// empty proposal to re-kick the proposer pipeline; it captures `sender`/`legislator` directly
/// rather than a handle back to the owning `Parliament`, avoiding an `Arc` reference cycle
/// (`SPEC_FULL.md` §9).
pub fn build_membership_signal(legislator: Replica, sender: Arc<dyn Sender>) -> Arc<Signal> {
    Arc::new(Signal::new(move || {
        let decree = Decree::new(legislator.clone(), 0, Vec::new(), DecreeType::UserDecree);
        let message = Message::new(decree, legislator.clone(), legislator.clone(), MessageType::RequestMessage);
        sender.reply(message);
    }))
}

/// Owns the proposer/acceptor/learner/updater contexts for one replica, registers their handlers
/// on a `Receiver`, and exposes the host-facing operations of `SPEC_FULL.md` §6.
pub struct Parliament {
    legislator: Replica,
    replicaset: Arc<Mutex<ReplicaSet>>,
    ledger: Arc<Ledger>,
    sender: Arc<dyn Sender>,
    learner: Arc<LearnerContext>,
    membership_signal: Arc<Signal>,
    #[allow(dead_code)]
    logger: Logger,
}

impl Parliament {
    /// Wires every role's handlers onto `receiver` and returns the assembled facade. The caller
    /// is responsible for constructing each role context (with whatever `Storage`/`RolloverQueue`
    /// backing it needs) and the membership apply handlers registered on `ledger` beforehand —
    /// `Parliament` only coordinates, it doesn't build collaborators itself.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        legislator: Replica,
        replicaset: Arc<Mutex<ReplicaSet>>,
        ledger: Arc<Ledger>,
        receiver: &mut dyn Receiver,
        sender: Arc<dyn Sender>,
        proposer: Arc<ProposerContext>,
        acceptor: Arc<AcceptorContext>,
        learner: Arc<LearnerContext>,
        updater: Arc<UpdaterContext>,
        membership_signal: Arc<Signal>,
        logger: Logger,
    ) -> Self {
        register_proposer(receiver, proposer);
        register_acceptor(receiver, acceptor);
        register_learner(receiver, learner.clone());
        register_updater(receiver, updater);

        Self {
            legislator,
            replicaset,
            ledger,
            sender,
            learner,
            membership_signal,
            logger,
        }
    }

    fn send_decree(&self, mut decree: Decree) {
        decree.author = self.legislator.clone();
        let message = Message::new(decree, self.legislator.clone(), self.legislator.clone(), MessageType::RequestMessage);
        self.sender.reply(message);
    }

    /// Proposes an `AddReplicaDecree` and blocks (with self-retry every `SIGNAL_RETRY_INTERVAL`,
    /// see [`crate::signal::Signal`]) until the membership apply handler runs, returning whether
    /// it succeeded.
    pub fn add_legislator(&self, hostname: impl Into<String>, port: u16, remote_directory: impl Into<String>) -> Result<bool, PaxosError> {
        let replica = Replica::new(hostname, port);
        let content = UpdateReplicaSetDecree {
            author: self.legislator.clone(),
            replica,
            remote_directory: remote_directory.into(),
        };
        let encoded = bincode::serialize(&content).map_err(|e| PaxosError::Serialize(e.to_string()))?;
        self.send_decree(Decree::new(self.legislator.clone(), 0, encoded, DecreeType::AddReplicaDecree));
        Ok(self.membership_signal.wait())
    }

    /// Proposes a `RemoveReplicaDecree`; dual of [`Self::add_legislator`].
    pub fn remove_legislator(&self, hostname: impl Into<String>, port: u16, remote_directory: impl Into<String>) -> Result<bool, PaxosError> {
        let replica = Replica::new(hostname, port);
        let content = UpdateReplicaSetDecree {
            author: self.legislator.clone(),
            replica,
            remote_directory: remote_directory.into(),
        };
        let encoded = bincode::serialize(&content).map_err(|e| PaxosError::Serialize(e.to_string()))?;
        self.send_decree(Decree::new(self.legislator.clone(), 0, encoded, DecreeType::RemoveReplicaDecree));
        Ok(self.membership_signal.wait())
    }

    /// Proposes a `UserDecree` carrying `entry`. Non-blocking: delivery is observed via whatever
    /// `UserDecree` handler the embedding application registered on the ledger.
    pub fn send_proposal(&self, entry: Vec<u8>) {
        self.send_decree(Decree::new(self.legislator.clone(), 0, entry, DecreeType::UserDecree));
    }

    pub fn set_active(&self) {
        self.learner.set_active();
    }

    pub fn set_inactive(&self) {
        self.learner.set_inactive();
    }

    pub fn get_legislators(&self) -> ReplicaSet {
        self.replicaset.lock().expect("replicaset lock poisoned").clone()
    }

    pub fn get_absentee_ballots(&self, max_ballots: usize) -> Vec<(Decree, ReplicaSet)> {
        self.learner.get_absentee_ballots(max_ballots)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EmptyDecreeHandler;
    use crate::pause::NoPause;
    use crate::storage::{Field, MemoryRolloverQueue, MemoryStorage};
    use crate::transport::Callback;
    use slog::o;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    type SharedCallback = Arc<dyn Fn(Message) + Send + Sync>;

    struct LoopbackBus {
        legislator: Replica,
        callbacks: Arc<StdMutex<HashMap<MessageType, Vec<SharedCallback>>>>,
    }

    impl LoopbackBus {
        fn new(legislator: Replica) -> Self {
            Self {
                legislator,
                callbacks: Arc::new(StdMutex::new(HashMap::new())),
            }
        }

        fn sender(&self) -> Arc<dyn Sender> {
            struct BusSender {
                callbacks: Arc<StdMutex<HashMap<MessageType, Vec<SharedCallback>>>>,
            }
            impl Sender for BusSender {
                fn reply(&self, message: Message) {
                    // Clone the callbacks out and drop the lock before invoking any of them: a
                    // callback (e.g. `handle_request` -> `reply_all`) may call back into `reply`
                    // on this same thread, and `Mutex` is not reentrant.
                    let callbacks = self
                        .callbacks
                        .lock()
                        .unwrap()
                        .get(&message.message_type)
                        .cloned()
                        .unwrap_or_default();
                    for callback in callbacks {
                        callback(message.clone());
                    }
                }
            }
            Arc::new(BusSender { callbacks: self.callbacks.clone() })
        }
    }

    impl Receiver for LoopbackBus {
        fn register_callback(&mut self, message_type: MessageType, callback: Callback) {
            self.callbacks
                .lock()
                .unwrap()
                .entry(message_type)
                .or_default()
                .push(Arc::from(callback));
        }
    }

    impl std::fmt::Debug for LoopbackBus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "LoopbackBus({})", self.legislator)
        }
    }

    fn single_node_parliament() -> (Parliament, Arc<Ledger>) {
        let legislator = Replica::new("a", 111);
        let replicaset = Arc::new(Mutex::new(ReplicaSet::from_iter([legislator.clone()])));
        let ledger = Arc::new(Ledger::new(Arc::new(MemoryRolloverQueue::default())));
        ledger.register_handler(DecreeType::UserDecree, Box::new(EmptyDecreeHandler));

        let mut bus = LoopbackBus::new(legislator.clone());
        let sender = bus.sender();

        let highest_proposed_decree = Field::new(Arc::new(MemoryStorage::default()) as Arc<dyn crate::storage::Storage<Decree>>);
        let promised_decree = Field::new(Arc::new(MemoryStorage::default()) as Arc<dyn crate::storage::Storage<Decree>>);
        let accepted_decree = Field::new(Arc::new(MemoryStorage::default()) as Arc<dyn crate::storage::Storage<Decree>>);

        let proposer = Arc::new(ProposerContext::with_pause_and_logger(
            legislator.clone(),
            ledger.clone(),
            replicaset.clone(),
            highest_proposed_decree,
            sender.clone(),
            Arc::new(NoPause),
            Logger::root(slog::Discard, o!()),
        ));
        let acceptor = Arc::new(AcceptorContext::new(replicaset.clone(), promised_decree, accepted_decree, sender.clone()));
        let learner = Arc::new(LearnerContext::new(legislator.clone(), replicaset.clone(), ledger.clone(), sender.clone()));
        let updater = Arc::new(UpdaterContext::new(ledger.clone(), sender.clone()));

        let signal = build_membership_signal(legislator.clone(), sender.clone());
        let parliament = Parliament::new(
            legislator,
            replicaset,
            ledger.clone(),
            &mut bus,
            sender,
            proposer,
            acceptor,
            learner,
            updater,
            signal,
            Logger::root(slog::Discard, o!()),
        );
        (parliament, ledger)
    }

    #[test]
    fn single_node_proposal_reaches_the_ledger() {
        let (parliament, ledger) = single_node_parliament();
        parliament.send_proposal(b"x".to_vec());
        assert_eq!(ledger.size(), 1);
        assert_eq!(ledger.tail().unwrap().content, b"x");
    }

    #[test]
    fn get_legislators_returns_current_membership_snapshot() {
        let (parliament, _ledger) = single_node_parliament();
        assert_eq!(parliament.get_legislators().size(), 1);
    }
}
