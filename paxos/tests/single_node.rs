//! S1: a lone replica proposes and commits without needing any peer.

mod common;

use common::{build_node, Network};
use paxos::{Replica, ReplicaSet};

#[test]
fn single_node_commits_its_own_proposal() {
    let network = Network::new();
    let a = Replica::new("a", 111);
    let node = build_node(&network, a.clone(), ReplicaSet::from_iter([a]));

    node.parliament.send_proposal(b"x".to_vec());

    assert_eq!(node.ledger.size(), 1);
    let tail = node.ledger.tail().unwrap();
    assert_eq!(tail.content, b"x");
    assert_eq!(tail.number, 1);
}
