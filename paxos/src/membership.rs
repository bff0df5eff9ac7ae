//! Apply-side handlers for `AddReplicaDecree`/`RemoveReplicaDecree`. See `SPEC_FULL.md` §4.6.
//!
//! Requires the `serde_messages` feature: a decree's `content` is opaque bytes, and turning it
//! back into an [`UpdateReplicaSetDecree`] needs `bincode`. This mirrors the original design,
//! where the analogous C++ handlers always had a `Serialize`/`Deserialize` template available.

use std::sync::{Arc, Mutex};

use slog::{error, info, o, warn, Logger};

use crate::decree::UpdateReplicaSetDecree;
use crate::error::PaxosError;
use crate::ledger::DecreeHandler;
use crate::replica::{Replica, ReplicaSet};
use crate::signal::Signal;
use crate::transport::{BootstrapFile, BootstrapTransfer};

/// Persists the membership view. Implemented durably by `paxos_storage::FileReplicaSetStore`;
/// `MemoryReplicaSetStore` below is the volatile default for tests and non-durable embeddings.
pub trait ReplicaSetStore: Send + Sync {
    fn save(&self, replicas: &ReplicaSet) -> Result<(), PaxosError>;
}

/// A no-op store for observers and tests that don't need the membership view to survive restart.
#[derive(Default)]
pub struct MemoryReplicaSetStore;

impl ReplicaSetStore for MemoryReplicaSetStore {
    fn save(&self, _replicas: &ReplicaSet) -> Result<(), PaxosError> {
        Ok(())
    }
}

fn decode(content: &[u8]) -> Result<UpdateReplicaSetDecree, PaxosError> {
    bincode::deserialize(content).map_err(|e| PaxosError::Deserialize(e.to_string()))
}

/// Applies an `AddReplicaDecree`: adds the replica to the shared membership view, persists it,
/// and — only on the replica that authored the decree — transfers this replica's on-disk state
/// to the new peer before unblocking the caller of `Parliament::add_legislator` via `signal`.
pub struct AddReplicaHandler {
    legislator: Replica,
    replicaset: Arc<Mutex<ReplicaSet>>,
    store: Arc<dyn ReplicaSetStore>,
    signal: Arc<Signal>,
    bootstrap: Arc<dyn BootstrapTransfer>,
    bootstrap_files: Box<dyn Fn() -> Vec<BootstrapFile> + Send + Sync>,
    logger: Logger,
}

impl AddReplicaHandler {
    pub fn new(
        legislator: Replica,
        replicaset: Arc<Mutex<ReplicaSet>>,
        store: Arc<dyn ReplicaSetStore>,
        signal: Arc<Signal>,
        bootstrap: Arc<dyn BootstrapTransfer>,
        bootstrap_files: impl Fn() -> Vec<BootstrapFile> + Send + Sync + 'static,
    ) -> Self {
        Self::with_logger(
            legislator,
            replicaset,
            store,
            signal,
            bootstrap,
            bootstrap_files,
            Logger::root(slog::Discard, o!()),
        )
    }

    pub fn with_logger(
        legislator: Replica,
        replicaset: Arc<Mutex<ReplicaSet>>,
        store: Arc<dyn ReplicaSetStore>,
        signal: Arc<Signal>,
        bootstrap: Arc<dyn BootstrapTransfer>,
        bootstrap_files: impl Fn() -> Vec<BootstrapFile> + Send + Sync + 'static,
        logger: Logger,
    ) -> Self {
        Self {
            legislator,
            replicaset,
            store,
            signal,
            bootstrap,
            bootstrap_files: Box::new(bootstrap_files),
            logger,
        }
    }
}

impl DecreeHandler for AddReplicaHandler {
    fn apply(&self, content: &[u8]) {
        let decree = match decode(content) {
            Ok(d) => d,
            Err(err) => {
                warn!(self.logger, "dropping malformed add-replica decree"; "error" => %err);
                return;
            }
        };

        {
            let mut replicaset = self.replicaset.lock().expect("replicaset lock poisoned");
            replicaset.add(decree.replica.clone());
            if let Err(err) = self.store.save(&replicaset) {
                error!(self.logger, "failed to persist replicaset after add"; "error" => %err);
            }
        }

        if decree.author == self.legislator {
            info!(self.logger, "bootstrapping newly added replica"; "replica" => %decree.replica);
            self.bootstrap.send_bundle(&decree.replica, (self.bootstrap_files)());
            self.signal.set(true);
        }
    }
}

/// Applies a `RemoveReplicaDecree`: removes the replica from the membership view, persists it,
/// and signals completion on every replica (not just the author), mirroring the original design.
pub struct RemoveReplicaHandler {
    replicaset: Arc<Mutex<ReplicaSet>>,
    store: Arc<dyn ReplicaSetStore>,
    signal: Arc<Signal>,
    logger: Logger,
}

impl RemoveReplicaHandler {
    pub fn new(replicaset: Arc<Mutex<ReplicaSet>>, store: Arc<dyn ReplicaSetStore>, signal: Arc<Signal>) -> Self {
        Self::with_logger(replicaset, store, signal, Logger::root(slog::Discard, o!()))
    }

    pub fn with_logger(replicaset: Arc<Mutex<ReplicaSet>>, store: Arc<dyn ReplicaSetStore>, signal: Arc<Signal>, logger: Logger) -> Self {
        Self {
            replicaset,
            store,
            signal,
            logger,
        }
    }
}

impl DecreeHandler for RemoveReplicaHandler {
    fn apply(&self, content: &[u8]) {
        let decree = match decode(content) {
            Ok(d) => d,
            Err(err) => {
                warn!(self.logger, "dropping malformed remove-replica decree"; "error" => %err);
                return;
            }
        };

        let mut replicaset = self.replicaset.lock().expect("replicaset lock poisoned");
        replicaset.remove(&decree.replica);
        if let Err(err) = self.store.save(&replicaset) {
            error!(self.logger, "failed to persist replicaset after remove"; "error" => %err);
        }
        drop(replicaset);

        self.signal.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicaset() -> Arc<Mutex<ReplicaSet>> {
        Arc::new(Mutex::new(ReplicaSet::from_iter([Replica::new("a", 1)])))
    }

    fn encode(decree: &UpdateReplicaSetDecree) -> Vec<u8> {
        bincode::serialize(decree).unwrap()
    }

    struct NoopBootstrap;
    impl BootstrapTransfer for NoopBootstrap {
        fn send_bundle(&self, _to: &Replica, _files: Vec<BootstrapFile>) {}
    }

    #[test]
    fn add_replica_updates_set_and_persists() {
        let set = replicaset();
        let store = Arc::new(MemoryReplicaSetStore);
        let signal = Arc::new(Signal::new(|| {}));
        let handler = AddReplicaHandler::new(
            Replica::new("a", 1),
            set.clone(),
            store,
            signal,
            Arc::new(NoopBootstrap),
            || Vec::new(),
        );

        let decree = UpdateReplicaSetDecree {
            author: Replica::new("other", 1),
            replica: Replica::new("b", 1),
            remote_directory: "/tmp".into(),
        };
        handler.apply(&encode(&decree));

        assert!(set.lock().unwrap().contains(&Replica::new("b", 1)));
    }

    #[test]
    fn add_replica_bootstraps_and_signals_only_when_author_is_self() {
        let set = replicaset();
        let store = Arc::new(MemoryReplicaSetStore);
        let signal = Arc::new(Signal::new(|| {}));
        let handler = AddReplicaHandler::new(
            Replica::new("a", 1),
            set,
            store,
            signal.clone(),
            Arc::new(NoopBootstrap),
            || Vec::new(),
        );

        let decree = UpdateReplicaSetDecree {
            author: Replica::new("a", 1),
            replica: Replica::new("b", 1),
            remote_directory: "/tmp".into(),
        };
        handler.apply(&encode(&decree));

        assert!(signal.wait());
    }

    #[test]
    fn remove_replica_updates_set_and_signals() {
        let set = Arc::new(Mutex::new(ReplicaSet::from_iter([Replica::new("a", 1), Replica::new("b", 1)])));
        let store = Arc::new(MemoryReplicaSetStore);
        let signal = Arc::new(Signal::new(|| {}));
        let handler = RemoveReplicaHandler::new(set.clone(), store, signal.clone());

        let decree = UpdateReplicaSetDecree {
            author: Replica::new("a", 1),
            replica: Replica::new("b", 1),
            remote_directory: String::new(),
        };
        handler.apply(&encode(&decree));

        assert!(!set.lock().unwrap().contains(&Replica::new("b", 1)));
        assert!(signal.wait());
    }

    #[test]
    fn malformed_content_is_dropped_without_panicking() {
        let set = replicaset();
        let store = Arc::new(MemoryReplicaSetStore);
        let signal = Arc::new(Signal::new(|| {}));
        let handler = RemoveReplicaHandler::new(set, store, signal);
        handler.apply(b"not a valid decree");
    }
}
