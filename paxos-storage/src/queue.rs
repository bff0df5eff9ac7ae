//! A crash-safe `RolloverQueue<T>` backed by an append-only log file plus a small persisted head
//! offset, mirroring the original implementation's `PersistentQueue<T>`: entries are never
//! rewritten in place, and `dequeue` only advances the offset past the head record rather than
//! truncating the file.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use paxos::error::PaxosError;
use paxos::storage::RolloverQueue;
use serde::de::DeserializeOwned;
use serde::Serialize;

const LENGTH_PREFIX_SIZE: usize = 8;

struct Inner<T> {
    /// `(encoded_len, value)`, in FIFO order; `encoded_len` includes the length prefix and is
    /// what `dequeue` adds to `head_offset` once the entry is popped.
    entries: VecDeque<(u64, T)>,
    head_offset: u64,
}

/// Durable FIFO. Construction replays `dir/queue.log` from the persisted head offset forward,
/// so a restarted replica recovers exactly the entries it had not yet dequeued.
pub struct FileRolloverQueue<T> {
    log_path: PathBuf,
    head_path: PathBuf,
    inner: Mutex<Inner<T>>,
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PaxosError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(PaxosError::Io)?;
    tmp.write_all(bytes).map_err(PaxosError::Io)?;
    tmp.flush().map_err(PaxosError::Io)?;
    tmp.persist(path).map_err(|err| PaxosError::DurableWriteFailed(err.to_string()))?;
    Ok(())
}

impl<T> FileRolloverQueue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send,
{
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PaxosError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(PaxosError::Io)?;
        let log_path = dir.join("queue.log");
        let head_path = dir.join("queue.head");

        let head_offset: u64 = match fs::read(&head_path) {
            Ok(bytes) if !bytes.is_empty() => {
                bincode::deserialize(&bytes).map_err(|e| PaxosError::Deserialize(e.to_string()))?
            }
            _ => 0,
        };

        let mut entries = VecDeque::new();
        if let Ok(mut file) = File::open(&log_path) {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(PaxosError::Io)?;
            let mut offset = head_offset as usize;
            while offset + LENGTH_PREFIX_SIZE <= buf.len() {
                let mut len_bytes = [0u8; LENGTH_PREFIX_SIZE];
                len_bytes.copy_from_slice(&buf[offset..offset + LENGTH_PREFIX_SIZE]);
                let record_len = u64::from_le_bytes(len_bytes) as usize;
                let start = offset + LENGTH_PREFIX_SIZE;
                let end = start + record_len;
                let value: T = bincode::deserialize(&buf[start..end])
                    .map_err(|e| PaxosError::Deserialize(e.to_string()))?;
                entries.push_back(((LENGTH_PREFIX_SIZE + record_len) as u64, value));
                offset = end;
            }
        }

        Ok(Self {
            log_path,
            head_path,
            inner: Mutex::new(Inner { entries, head_offset }),
        })
    }
}

impl<T> RolloverQueue<T> for FileRolloverQueue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn enqueue(&self, item: T) -> Result<(), PaxosError> {
        let mut inner = self.inner.lock().expect("rollover queue lock poisoned");
        let bytes = bincode::serialize(&item).map_err(|e| PaxosError::Serialize(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(PaxosError::Io)?;
        file.write_all(&(bytes.len() as u64).to_le_bytes()).map_err(PaxosError::Io)?;
        file.write_all(&bytes).map_err(PaxosError::Io)?;
        file.flush().map_err(PaxosError::Io)?;

        inner.entries.push_back(((LENGTH_PREFIX_SIZE + bytes.len()) as u64, item));
        Ok(())
    }

    fn dequeue(&self) -> Result<(), PaxosError> {
        let mut inner = self.inner.lock().expect("rollover queue lock poisoned");
        let Some((encoded_len, _)) = inner.entries.pop_front() else {
            return Ok(());
        };
        inner.head_offset += encoded_len;
        let bytes = bincode::serialize(&inner.head_offset).map_err(|e| PaxosError::Serialize(e.to_string()))?;
        atomic_write(&self.head_path, &bytes)
    }

    fn last(&self) -> Option<T> {
        self.inner
            .lock()
            .expect("rollover queue lock poisoned")
            .entries
            .back()
            .map(|(_, v)| v.clone())
    }

    fn iter(&self) -> Vec<T> {
        self.inner
            .lock()
            .expect("rollover queue lock poisoned")
            .entries
            .iter()
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("rollover queue lock poisoned").entries.len()
    }
}
