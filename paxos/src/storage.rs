//! The durable/volatile storage contract (`Storage<T>`, `RolloverQueue<T>`) and their in-memory
//! implementations. Durable, file-backed implementations live in the sibling `paxos-storage`
//! crate; this module defines only the contract plus the volatile defaults used by tests and by
//! observer replicas that don't need crash durability.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::PaxosError;

/// A single durable storage cell: get the current value, put a new one.
///
/// Implementations must make `put` appear atomic to a concurrent `get` on the same or another
/// process after a restart — a temp-file-plus-rename strategy is sufficient and is what
/// `paxos_storage::FileStorage` uses.
pub trait Storage<T>: Send + Sync {
    fn get(&self) -> Result<T, PaxosError>;
    fn put(&self, value: T) -> Result<(), PaxosError>;
}

/// A volatile, in-process `Storage<T>` backed by a `Mutex`. Used for tests and for roles that
/// don't require crash durability (e.g. an `is_observer` learner).
pub struct MemoryStorage<T> {
    value: Mutex<T>,
}

impl<T: Clone + Default> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(T::default()),
        }
    }
}

impl<T: Clone> MemoryStorage<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }
}

impl<T: Clone + Send> Storage<T> for MemoryStorage<T> {
    fn get(&self) -> Result<T, PaxosError> {
        Ok(self.value.lock().expect("memory storage lock poisoned").clone())
    }

    fn put(&self, value: T) -> Result<(), PaxosError> {
        *self.value.lock().expect("memory storage lock poisoned") = value;
        Ok(())
    }
}

/// A named, crash-safe storage cell. Thin convenience wrapper around an `Arc<dyn Storage<T>>`
/// so callers don't juggle trait objects directly (mirrors the C++ original's `Field<T>`).
#[derive(Clone)]
pub struct Field<T> {
    store: Arc<dyn Storage<T>>,
}

impl<T> Field<T> {
    pub fn new(store: Arc<dyn Storage<T>>) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<T, PaxosError> {
        self.store.get()
    }

    /// Writes `value` durably. A failure here is fatal per the error-handling design: a promise
    /// or a highest-proposed-decree that silently fails to persist is a correctness break, not a
    /// recoverable error, so callers on the hot path should propagate and the embedding
    /// application should treat `Err` here as a reason to stop serving this replica.
    pub fn put(&self, value: T) -> Result<(), PaxosError> {
        self.store.put(value)
    }
}

/// A durable FIFO over typed entries backing the ledger.
///
/// Implementations must survive process restart with all durable entries intact, and must
/// expose `iter` from head to tail.
pub trait RolloverQueue<T>: Send + Sync {
    fn enqueue(&self, item: T) -> Result<(), PaxosError>;
    /// Pops the head. A no-op if the queue is empty.
    fn dequeue(&self) -> Result<(), PaxosError>;
    /// The most recently enqueued item, or `None` if the queue is empty.
    fn last(&self) -> Option<T>;
    /// All entries from head to tail.
    fn iter(&self) -> Vec<T>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A volatile `RolloverQueue<T>` backed by a `VecDeque`. Used by tests and non-durable learners.
pub struct MemoryRolloverQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for MemoryRolloverQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Clone + Send> RolloverQueue<T> for MemoryRolloverQueue<T> {
    fn enqueue(&self, item: T) -> Result<(), PaxosError> {
        self.items.lock().expect("rollover queue lock poisoned").push_back(item);
        Ok(())
    }

    fn dequeue(&self) -> Result<(), PaxosError> {
        self.items.lock().expect("rollover queue lock poisoned").pop_front();
        Ok(())
    }

    fn last(&self) -> Option<T> {
        self.items.lock().expect("rollover queue lock poisoned").back().cloned()
    }

    fn iter(&self) -> Vec<T> {
        self.items.lock().expect("rollover queue lock poisoned").iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.items.lock().expect("rollover queue lock poisoned").len()
    }
}
