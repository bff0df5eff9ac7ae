//! Durable, file-backed implementations of `paxos`'s storage contracts.
//!
//! `paxos::storage` defines `Storage<T>` and `RolloverQueue<T>` and ships volatile, in-memory
//! implementations sufficient for tests and observer replicas. This crate supplies the durable
//! counterparts a voting replica needs to survive a restart: [`FileStorage`] for single-value
//! fields (promised/accepted decree, highest-proposed-number) and [`FileRolloverQueue`] for the
//! ledger's append log. Both require the `persistent_storage` feature.

#[cfg(feature = "persistent_storage")]
pub mod field;
#[cfg(feature = "persistent_storage")]
pub mod queue;
#[cfg(feature = "persistent_storage")]
pub mod replicaset_store;

#[cfg(feature = "persistent_storage")]
pub use field::FileStorage;
#[cfg(feature = "persistent_storage")]
pub use queue::FileRolloverQueue;
#[cfg(feature = "persistent_storage")]
pub use replicaset_store::FileReplicaSetStore;
