//! The unit of Paxos agreement, its ordering relations, and the membership-change payload
//! carried as decree content.

use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::replica::Replica;

/// The kind of a [`Decree`], determining which [`crate::ledger::DecreeHandler`] applies it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecreeType {
    /// An opaque entry supplied by the embedding application.
    #[default]
    UserDecree,
    /// Adds a replica to the membership view.
    AddReplicaDecree,
    /// Removes a replica from the membership view.
    RemoveReplicaDecree,
}

/// A proposal, uniquely identified by `(author, number)`.
///
/// `root_number` equals `number` when the decree is first created and is carried forward,
/// unchanged, through every retry of the same logical request so that downstream
/// deduplication (the ledger, the learner's gap tracking) can collapse retries of one request
/// into a single committed entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decree {
    pub author: Replica,
    pub number: i64,
    pub root_number: i64,
    pub content: Vec<u8>,
    pub decree_type: DecreeType,
}

impl Decree {
    /// Creates a fresh decree: `root_number` starts out equal to `number`.
    pub fn new(author: Replica, number: i64, content: Vec<u8>, decree_type: DecreeType) -> Self {
        Self {
            author,
            number,
            root_number: number,
            content,
            decree_type,
        }
    }

    /// Creates a retry of an earlier decree: same `root_number`, new `number`.
    pub fn retry(author: Replica, number: i64, root_number: i64, content: Vec<u8>, decree_type: DecreeType) -> Self {
        Self {
            author,
            number,
            root_number,
            content,
            decree_type,
        }
    }
}

/// Primary ordering: arithmetic comparison of `number`.
pub fn compare_decrees(lhs: &Decree, rhs: &Decree) -> Ordering {
    lhs.number.cmp(&rhs.number)
}

/// Ordering over `root_number`, used to walk the ledger skipping retries.
pub fn compare_root_decrees(lhs: &Decree, rhs: &Decree) -> Ordering {
    lhs.root_number.cmp(&rhs.root_number)
}

pub fn is_decree_higher(lhs: &Decree, rhs: &Decree) -> bool {
    compare_decrees(lhs, rhs) == Ordering::Greater
}

pub fn is_decree_higher_or_equal(lhs: &Decree, rhs: &Decree) -> bool {
    compare_decrees(lhs, rhs) != Ordering::Less
}

pub fn is_decree_equal(lhs: &Decree, rhs: &Decree) -> bool {
    compare_decrees(lhs, rhs) == Ordering::Equal
}

pub fn is_decree_lower(lhs: &Decree, rhs: &Decree) -> bool {
    compare_decrees(lhs, rhs) == Ordering::Less
}

pub fn is_decree_lower_or_equal(lhs: &Decree, rhs: &Decree) -> bool {
    compare_decrees(lhs, rhs) != Ordering::Greater
}

/// Strict contiguity: `rhs.number == lhs.number + 1`.
pub fn is_decree_ordered(lhs: &Decree, rhs: &Decree) -> bool {
    rhs.number == lhs.number + 1
}

/// Strict contiguity over `root_number`.
pub fn is_root_decree_ordered(lhs: &Decree, rhs: &Decree) -> bool {
    rhs.root_number == lhs.root_number + 1
}

pub fn is_root_decree_equal(lhs: &Decree, rhs: &Decree) -> bool {
    compare_root_decrees(lhs, rhs) == Ordering::Equal
}

pub fn is_root_decree_higher(lhs: &Decree, rhs: &Decree) -> bool {
    compare_root_decrees(lhs, rhs) == Ordering::Greater
}

pub fn is_root_decree_higher_or_equal(lhs: &Decree, rhs: &Decree) -> bool {
    compare_root_decrees(lhs, rhs) != Ordering::Less
}

pub fn is_root_decree_lower(lhs: &Decree, rhs: &Decree) -> bool {
    compare_root_decrees(lhs, rhs) == Ordering::Less
}

/// Compares every observable field: used by tests and diagnostics, never by the append
/// decision itself (which is driven solely by `number`, see [`crate::ledger::Ledger::append`]).
pub fn is_decree_identical(lhs: &Decree, rhs: &Decree) -> bool {
    lhs.author == rhs.author
        && lhs.number == rhs.number
        && lhs.root_number == rhs.root_number
        && lhs.content == rhs.content
        && lhs.decree_type == rhs.decree_type
}

/// Map key wrapper giving `Decree` a total order suitable for `BTreeMap` keys: primary on
/// `number`, tie-broken by author so that two concurrent decrees with the same `number` from
/// different authors occupy distinct slots (`compare_map_decree` in the original design).
#[derive(Clone, Debug)]
pub struct MapDecreeKey(pub Decree);

impl PartialEq for MapDecreeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for MapDecreeKey {}

impl PartialOrd for MapDecreeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MapDecreeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_decrees(&self.0, &other.0).then_with(|| self.0.author.cmp(&other.0.author))
    }
}

/// Orders decrees ascending by `number`; backs the learner's `tracked_future_decrees` min-heap
/// via `Reverse(AscendingDecree(..))`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AscendingDecree(pub Decree);

impl PartialOrd for AscendingDecree {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AscendingDecree {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_decrees(&self.0, &other.0)
    }
}

/// The content of an `AddReplicaDecree`/`RemoveReplicaDecree`, deserialized by the membership
/// apply handlers (see [`crate::membership`]).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UpdateReplicaSetDecree {
    pub author: Replica,
    pub replica: Replica,
    pub remote_directory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(author: &str, number: i64, root: i64) -> Decree {
        Decree::retry(Replica::new(author, 1), number, root, vec![], DecreeType::UserDecree)
    }

    #[test]
    fn number_ordering() {
        assert!(is_decree_higher(&d("a", 2, 2), &d("a", 1, 1)));
        assert!(is_decree_lower(&d("a", 1, 1), &d("a", 2, 2)));
        assert!(is_decree_equal(&d("a", 1, 1), &d("b", 1, 1)));
    }

    #[test]
    fn contiguity_is_strict() {
        assert!(is_decree_ordered(&d("a", 1, 1), &d("a", 2, 2)));
        assert!(!is_decree_ordered(&d("a", 1, 1), &d("a", 3, 3)));
    }

    #[test]
    fn root_contiguity_ignores_number() {
        // number goes backwards (2 -> 1) but root strictly increases (2 -> 3): still ordered.
        assert!(is_root_decree_ordered(&d("a", 2, 2), &d("a", 1, 3)));
    }

    #[test]
    fn map_decree_key_tie_breaks_on_author() {
        let a = MapDecreeKey(d("a", 1, 1));
        let b = MapDecreeKey(d("b", 1, 1));
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn identical_requires_content_and_type_match() {
        let mut x = d("a", 1, 1);
        let mut y = x.clone();
        assert!(is_decree_identical(&x, &y));
        y.content = vec![1];
        assert!(!is_decree_identical(&x, &y));
        x.decree_type = DecreeType::AddReplicaDecree;
        assert!(!is_decree_identical(&x, &y));
    }
}
