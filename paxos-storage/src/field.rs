//! A crash-safe `Storage<T>` cell backed by a single file, written atomically via a temp file
//! plus rename so a crash mid-write never leaves a torn value behind (`paxos::storage::Storage`
//! requires exactly this from a durable implementation).

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use paxos::error::PaxosError;
use paxos::storage::Storage;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Durable single-value storage. `get()` on a file that doesn't exist yet (the replica's first
/// boot) returns `T::default()` rather than an error.
pub struct FileStorage<T> {
    path: PathBuf,
    // Serializes concurrent `put`s; reads don't need it but the contract is simpler uniform.
    write_lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T> FileStorage<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }
}

impl<T> Storage<T> for FileStorage<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync,
{
    fn get(&self) -> Result<T, PaxosError> {
        match fs::read(&self.path) {
            Ok(bytes) if !bytes.is_empty() => {
                bincode::deserialize(&bytes).map_err(|e| PaxosError::Deserialize(e.to_string()))
            }
            Ok(_) => Ok(T::default()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(PaxosError::Io(err)),
        }
    }

    fn put(&self, value: T) -> Result<(), PaxosError> {
        let _guard = self.write_lock.lock().expect("field write lock poisoned");
        let bytes = bincode::serialize(&value).map_err(|e| PaxosError::Serialize(e.to_string()))?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(PaxosError::Io)?;
        tmp.write_all(&bytes).map_err(PaxosError::Io)?;
        tmp.flush().map_err(PaxosError::Io)?;
        tmp.persist(&self.path)
            .map_err(|err| PaxosError::DurableWriteFailed(err.to_string()))?;
        Ok(())
    }
}
