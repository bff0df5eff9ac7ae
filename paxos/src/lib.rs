//! A replicated state-machine consensus library implementing the Paxos family of algorithms.
//!
//! A cluster of peer processes ("legislators") agrees on a totally ordered sequence of opaque
//! user entries ("decrees"), each applied in order on every replica through a user-supplied
//! handler. [`parliament::Parliament`] is the top-level facade for one replica; see its
//! documentation for the embedding API.
//!
//! TCP transport, on-disk byte layout, and the bootstrap wire format are intentionally left to
//! the embedding application — this crate specifies the `Sender`/`Receiver`/`BootstrapTransfer`
//! contracts (see [`transport`]) and a durable `Storage`/`RolloverQueue` contract (see
//! [`storage`]), with crash-safe file-backed implementations of the latter in the sibling
//! `paxos-storage` crate.

pub mod config;
pub mod decree;
pub mod error;
pub mod ledger;
#[cfg(feature = "serde_messages")]
pub mod membership;
pub mod message;
pub mod parliament;
pub mod pause;
pub mod replica;
pub mod roles;
pub mod signal;
pub mod storage;
pub mod transport;
mod util;

pub use decree::{Decree, DecreeType};
pub use error::PaxosError;
pub use ledger::Ledger;
pub use message::{Message, MessageType};
pub use parliament::Parliament;
pub use replica::{Replica, ReplicaSet};
