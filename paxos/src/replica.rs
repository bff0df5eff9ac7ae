//! Replica identity and the shared membership view.

use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one legislator by its network address.
///
/// Ordering is lexicographic on `hostname` first, then `port`, which is what
/// lets `Replica` key a `BTreeSet`/`BTreeMap` directly and gives deterministic
/// iteration order across the cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Replica {
    pub hostname: String,
    pub port: u16,
}

impl Replica {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// An unordered collection of [`Replica`]s supporting the set algebra the
/// proposer/learner/membership handlers need.
///
/// Backed by a `BTreeSet` so iteration order matches the `Replica` ordering
/// contract (hostname, then port) without any extra sort step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplicaSet {
    replicas: BTreeSet<Replica>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter(iter: impl IntoIterator<Item = Replica>) -> Self {
        Self {
            replicas: iter.into_iter().collect(),
        }
    }

    pub fn add(&mut self, replica: Replica) {
        self.replicas.insert(replica);
    }

    pub fn remove(&mut self, replica: &Replica) {
        self.replicas.remove(replica);
    }

    pub fn contains(&self, replica: &Replica) -> bool {
        self.replicas.contains(replica)
    }

    pub fn size(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn clear(&mut self) {
        self.replicas.clear();
    }

    /// The quorum size for the current membership: `floor(n/2) + 1`.
    pub fn quorum_size(&self) -> usize {
        self.size() / 2 + 1
    }

    pub fn intersection(&self, other: &ReplicaSet) -> ReplicaSet {
        ReplicaSet {
            replicas: self
                .replicas
                .intersection(&other.replicas)
                .cloned()
                .collect(),
        }
    }

    pub fn difference(&self, other: &ReplicaSet) -> ReplicaSet {
        ReplicaSet {
            replicas: self.replicas.difference(&other.replicas).cloned().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.iter()
    }
}

impl<'a> IntoIterator for &'a ReplicaSet {
    type Item = &'a Replica;
    type IntoIter = std::collections::btree_set::Iter<'a, Replica>;

    fn into_iter(self) -> Self::IntoIter {
        self.replicas.iter()
    }
}

impl FromIterator<Replica> for ReplicaSet {
    fn from_iter<T: IntoIterator<Item = Replica>>(iter: T) -> Self {
        ReplicaSet::from_iter(iter)
    }
}
