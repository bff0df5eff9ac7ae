//! Property-style checks over randomized input, per the invariants each module documents rather
//! than a single fixed example.

use std::sync::{Arc, Mutex};

use paxos::decree::DecreeType;
use paxos::roles::LearnerContext;
use paxos::storage::MemoryRolloverQueue;
use paxos::transport::Sender;
use paxos::{Decree, Ledger, Message, MessageType, Replica, ReplicaSet};
use rand::Rng;

/// `Ledger::append` admits a decree whenever its `number` OR its `root_number` is strictly higher
/// than the current tail's (see `SPEC_FULL.md` §4.4, §8 S5: a retry can regress `number` below the
/// tail yet still be admitted because its `root_number` strictly increased). `number` and
/// `root_number` are randomized independently so the two admission rules are each exercised, and
/// exercised apart from one another, across 200 random sequences rather than one fixed example.
#[test]
fn ledger_size_matches_count_of_strictly_increasing_prefix() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let ledger = Ledger::new(Arc::new(MemoryRolloverQueue::default()));
        let len = rng.gen_range(0..50);
        let mut highest_number = 0i64;
        let mut highest_root = 0i64;
        let mut expected = 0usize;
        for _ in 0..len {
            let number = rng.gen_range(0..20);
            let root_number = rng.gen_range(0..20);
            let admitted = number > highest_number || root_number > highest_root;
            let decree = Decree::retry(Replica::new("a", 1), number, root_number, vec![], DecreeType::UserDecree);
            assert_eq!(ledger.append(decree), admitted);
            if admitted {
                highest_number = number;
                highest_root = root_number;
                expected += 1;
            }
        }
        assert_eq!(ledger.size(), expected);
    }
}

#[cfg(feature = "serde_messages")]
#[test]
fn message_round_trips_through_bincode() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let decree = Decree::new(
            Replica::new(format!("host{}", rng.gen_range(0..5)), rng.gen_range(0..65535)),
            rng.gen_range(0..1_000_000),
            (0..rng.gen_range(0..16)).map(|_| rng.gen()).collect(),
            DecreeType::UserDecree,
        );
        let message = Message::new(
            decree,
            Replica::new("from", rng.gen_range(0..65535)),
            Replica::new("to", rng.gen_range(0..65535)),
            MessageType::AcceptMessage,
        );
        let encoded = bincode::serialize(&message).unwrap();
        let decoded: Message = bincode::deserialize(&encoded).unwrap();
        assert_eq!(message, decoded);
    }
}

/// Replaying the same `Accepted` must not double-count a responder or double-append: the
/// `ReplicaSet` backing `accepted_map` is a set, and the ledger's own `append` is itself
/// idempotent against a repeated `number`.
#[test]
fn handle_accepted_is_idempotent_under_replay() {
    struct RecordingSender {
        sent: Mutex<Vec<Message>>,
    }
    impl Sender for RecordingSender {
        fn reply(&self, message: Message) {
            self.sent.lock().unwrap().push(message);
        }
    }

    let a = Replica::new("a", 1);
    let b = Replica::new("b", 1);
    let c = Replica::new("c", 1);
    let members = Arc::new(Mutex::new(ReplicaSet::from_iter([a.clone(), b.clone(), c.clone()])));
    let ledger = Arc::new(Ledger::new(Arc::new(MemoryRolloverQueue::default())));
    let sender = Arc::new(RecordingSender { sent: Mutex::new(Vec::new()) });
    let learner = LearnerContext::new(Replica::new("self", 1), members, ledger.clone(), sender);

    let d = Decree::retry(a.clone(), 1, 1, b"x".to_vec(), DecreeType::UserDecree);
    let message = Message::new(d.clone(), a.clone(), Replica::new("self", 1), MessageType::AcceptedMessage);

    // One responder short of quorum(2); replaying it any number of times must not manufacture a
    // second vote out of the same sender.
    for _ in 0..10 {
        learner.handle_accepted(&message);
    }
    assert_eq!(ledger.size(), 0);
    let ballots = learner.get_absentee_ballots(100);
    assert_eq!(ballots.len(), 1);
    let (_, absentees) = &ballots[0];
    assert_eq!(absentees.size(), 2);

    // A second, distinct voter now reaches quorum; replaying the whole history again afterwards
    // must not re-append or otherwise change the ledger.
    let from_b = Message::new(d, b, Replica::new("self", 1), MessageType::AcceptedMessage);
    learner.handle_accepted(&from_b);
    assert_eq!(ledger.size(), 1);
    for _ in 0..10 {
        learner.handle_accepted(&message);
        learner.handle_accepted(&from_b);
    }
    assert_eq!(ledger.size(), 1);
}
