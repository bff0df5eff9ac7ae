//! Persists the cluster membership view to a fixed `paxos.replicaset` file in a data directory,
//! mirroring the original's `LoadReplicaSet(directory)`.

use std::fs;
use std::path::Path;

use paxos::error::PaxosError;
use paxos::storage::Storage;
use paxos::ReplicaSet;

use crate::field::FileStorage;

/// A `Storage<ReplicaSet>` bound to `<dir>/paxos.replicaset`. A membership change decree's apply
/// handler calls `put` after updating the in-memory view so the new membership survives a
/// restart; bootstrap reads it via `get` before the replica starts serving.
pub struct FileReplicaSetStore {
    inner: FileStorage<ReplicaSet>,
}

impl FileReplicaSetStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PaxosError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(PaxosError::Io)?;
        Ok(Self { inner: FileStorage::new(dir.join("paxos.replicaset")) })
    }
}

impl Storage<ReplicaSet> for FileReplicaSetStore {
    fn get(&self) -> Result<ReplicaSet, PaxosError> {
        self.inner.get()
    }

    fn put(&self, value: ReplicaSet) -> Result<(), PaxosError> {
        self.inner.put(value)
    }
}
