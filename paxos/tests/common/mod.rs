//! An in-process network double shared by the integration tests: every node's `Sender` looks
//! up the destination replica in a shared table and invokes whatever callbacks that replica's
//! `Receiver` registered, optionally dropping messages between partitioned replica pairs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use paxos::ledger::EmptyDecreeHandler;
use paxos::pause::NoPause;
use paxos::roles::{AcceptorContext, LearnerContext, ProposerContext, UpdaterContext};
use paxos::storage::{Field, MemoryRolloverQueue, MemoryStorage, Storage};
use paxos::transport::{Callback, Receiver, Sender};
use paxos::{Decree, DecreeType, Ledger, Message, MessageType, Parliament, Replica, ReplicaSet};

type SharedCallback = Arc<dyn Fn(Message) + Send + Sync>;

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<Replica, HashMap<MessageType, Vec<SharedCallback>>>,
    /// Unordered pairs currently unable to reach each other.
    partitions: HashSet<(Replica, Replica)>,
}

fn pair(a: &Replica, b: &Replica) -> (Replica, Replica) {
    if a.hostname < b.hostname || (a.hostname == b.hostname && a.port <= b.port) {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// A shared in-process "network" connecting every node created via [`Network::node`].
pub struct Network {
    state: Mutex<NetworkState>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(NetworkState::default()) })
    }

    /// Drops every message sent between `a` and `b` in either direction until [`Self::heal`].
    pub fn partition(&self, a: &Replica, b: &Replica) {
        self.state.lock().unwrap().partitions.insert(pair(a, b));
    }

    pub fn heal(&self, a: &Replica, b: &Replica) {
        self.state.lock().unwrap().partitions.remove(&pair(a, b));
    }

    fn reachable(&self, a: &Replica, b: &Replica) -> bool {
        !self.state.lock().unwrap().partitions.contains(&pair(a, b))
    }

    /// Builds the `(Receiver, Sender)` pair for one node identified by `legislator`.
    pub fn node(self: &Arc<Self>, legislator: Replica) -> (NodeReceiver, Arc<dyn Sender>) {
        self.state.lock().unwrap().nodes.entry(legislator.clone()).or_default();
        (
            NodeReceiver { legislator: legislator.clone(), network: self.clone() },
            Arc::new(NodeSender { from: legislator, network: self.clone() }),
        )
    }
}

pub struct NodeReceiver {
    legislator: Replica,
    network: Arc<Network>,
}

impl Receiver for NodeReceiver {
    fn register_callback(&mut self, message_type: MessageType, callback: Callback) {
        self.network
            .state
            .lock()
            .unwrap()
            .nodes
            .entry(self.legislator.clone())
            .or_default()
            .entry(message_type)
            .or_default()
            .push(Arc::from(callback));
    }
}

struct NodeSender {
    from: Replica,
    network: Arc<Network>,
}

impl Sender for NodeSender {
    fn reply(&self, message: Message) {
        if !self.network.reachable(&self.from, &message.to) {
            return;
        }
        // Clone the destination's callbacks out and release the lock before invoking any of
        // them: a callback commonly calls `reply`/`reply_all` again on the same thread (e.g. a
        // prepare handler replying with a promise), and `Mutex` is not reentrant.
        let callbacks = {
            let state = self.network.state.lock().unwrap();
            state
                .nodes
                .get(&message.to)
                .and_then(|callbacks| callbacks.get(&message.message_type))
                .cloned()
                .unwrap_or_default()
        };
        for callback in callbacks {
            callback(message.clone());
        }
    }
}

/// One fully-wired replica: its `Parliament` facade plus the ledger backing it, so tests can
/// assert on committed content directly.
pub struct Node {
    pub parliament: Parliament,
    pub ledger: Arc<Ledger>,
}

fn memory_field() -> Field<Decree> {
    Field::new(Arc::new(MemoryStorage::default()) as Arc<dyn Storage<Decree>>)
}

/// Wires a full replica (all four role contexts, a fresh ledger, `NoPause` for deterministic
/// synchronous retries) onto `network`, with `members` as its initial membership view.
pub fn build_node(network: &Arc<Network>, legislator: Replica, members: ReplicaSet) -> Node {
    let (mut receiver, sender) = network.node(legislator.clone());
    let replicaset = Arc::new(Mutex::new(members));
    let ledger = Arc::new(Ledger::new(Arc::new(MemoryRolloverQueue::default())));
    ledger.register_handler(DecreeType::UserDecree, Box::new(EmptyDecreeHandler));

    let proposer = Arc::new(ProposerContext::with_pause_and_logger(
        legislator.clone(),
        ledger.clone(),
        replicaset.clone(),
        memory_field(),
        sender.clone(),
        Arc::new(NoPause),
        slog::Logger::root(slog::Discard, slog::o!()),
    ));
    let acceptor = Arc::new(AcceptorContext::new(replicaset.clone(), memory_field(), memory_field(), sender.clone()));
    let learner = Arc::new(LearnerContext::new(legislator.clone(), replicaset.clone(), ledger.clone(), sender.clone()));
    let updater = Arc::new(UpdaterContext::new(ledger.clone(), sender.clone()));

    let signal = paxos::parliament::build_membership_signal(legislator.clone(), sender.clone());
    let parliament = Parliament::new(
        legislator,
        replicaset,
        ledger.clone(),
        &mut receiver,
        sender,
        proposer,
        acceptor,
        learner,
        updater,
        signal,
        slog::Logger::root(slog::Discard, slog::o!()),
    );

    Node { parliament, ledger }
}
