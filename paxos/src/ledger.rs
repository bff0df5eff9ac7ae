//! The durable, in-order sequence of committed decrees, and the apply-side handler dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use slog::{o, warn, Logger};

use crate::decree::{is_decree_higher, is_root_decree_higher, is_root_decree_ordered, Decree, DecreeType};
use crate::storage::RolloverQueue;

/// Applies one committed decree's content. Implementations must be short and non-blocking: they
/// run while the ledger's internal lock is held, which is what gives apply order the same
/// total order as `Ledger::append` succeeding — but also means a slow or blocking handler stalls
/// every other append on this replica. Implementations must also be idempotent, since a
/// crash-recovery replay of the ledger may invoke a handler again for an already-applied decree.
pub trait DecreeHandler: Send + Sync {
    fn apply(&self, content: &[u8]);
}

/// The default handler bound to `UserDecree` until the embedding application registers its own.
#[derive(Default)]
pub struct EmptyDecreeHandler;

impl DecreeHandler for EmptyDecreeHandler {
    fn apply(&self, _content: &[u8]) {}
}

/// Fans a decree's content out to every handler added via `add_handler`. Lets the embedding
/// application layer multiple independent `UserDecree` observers onto one ledger slot.
#[derive(Default)]
pub struct CompositeHandler {
    handlers: Mutex<Vec<Box<dyn DecreeHandler>>>,
}

impl CompositeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Box<dyn DecreeHandler>) {
        self.handlers.lock().expect("composite handler lock poisoned").push(handler);
    }
}

impl DecreeHandler for CompositeHandler {
    fn apply(&self, content: &[u8]) {
        for handler in self.handlers.lock().expect("composite handler lock poisoned").iter() {
            handler.apply(content);
        }
    }
}

struct LedgerInner {
    decrees: Arc<dyn RolloverQueue<Decree>>,
    handlers: HashMap<DecreeType, Box<dyn DecreeHandler>>,
}

/// Durable, in-order append log of committed decrees. See `SPEC_FULL.md` §4.4.
pub struct Ledger {
    inner: Mutex<LedgerInner>,
    logger: Logger,
}

impl Ledger {
    pub fn new(decrees: Arc<dyn RolloverQueue<Decree>>) -> Self {
        Self::with_logger(decrees, Logger::root(slog::Discard, o!()))
    }

    pub fn with_logger(decrees: Arc<dyn RolloverQueue<Decree>>, logger: Logger) -> Self {
        let mut handlers: HashMap<DecreeType, Box<dyn DecreeHandler>> = HashMap::new();
        handlers.insert(DecreeType::UserDecree, Box::new(EmptyDecreeHandler));
        Self {
            inner: Mutex::new(LedgerInner { decrees, handlers }),
            logger,
        }
    }

    /// Installs the apply-side handler for `decree_type`, replacing any previous one.
    pub fn register_handler(&self, decree_type: DecreeType, handler: Box<dyn DecreeHandler>) {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .handlers
            .insert(decree_type, handler);
    }

    /// Appends `decree` if it is strictly higher than the current tail, either by `number` or by
    /// `root_number`. The `root_number` branch is what lets a retry whose `number` regressed
    /// below the tail (a different author raced it to a lower round number) still land once its
    /// logical request is actually ahead: see `SPEC_FULL.md` §8 S5. Invokes the registered
    /// handler for its type while still holding the lock. Returns whether the decree was
    /// appended (`false` for duplicates and out-of-order entries, which are dropped and logged
    /// per the spec's error-handling policy).
    pub fn append(&self, decree: Decree) -> bool {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        let tail = inner.decrees.last();
        let should_append = match &tail {
            Some(tail) => is_decree_higher(&decree, tail) || is_root_decree_higher(&decree, tail),
            None => true,
        };
        if !should_append {
            let (tail_number, tail_root) = tail.map(|t| (t.number, t.root_number)).unwrap_or((0, 0));
            warn!(
                self.logger,
                "dropping out-of-order or duplicate decree";
                "ledger_number" => tail_number,
                "ledger_root" => tail_root,
                "received_number" => decree.number,
                "received_root" => decree.root_number,
            );
            return false;
        }

        let decree_type = decree.decree_type;
        let content = decree.content.clone();
        if let Err(err) = inner.decrees.enqueue(decree) {
            warn!(self.logger, "failed to durably append decree"; "error" => %err);
            return false;
        }
        if let Some(handler) = inner.handlers.get(&decree_type) {
            handler.apply(&content);
        }
        true
    }

    /// Pops the head entry. Raw rollover primitive: the embedding application must only call
    /// this once it has externally confirmed the trimmed prefix has been replicated to every
    /// live peer (see `SPEC_FULL.md` §9's rollover open question).
    pub fn remove(&self) {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        let _ = inner.decrees.dequeue();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("ledger lock poisoned").decrees.len()
    }

    pub fn head(&self) -> Option<Decree> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner.decrees.iter().into_iter().next()
    }

    pub fn tail(&self) -> Option<Decree> {
        self.inner.lock().expect("ledger lock poisoned").decrees.last()
    }

    /// The first entry whose root-number strictly exceeds `previous.root_number`, if any.
    pub fn next(&self, previous: &Decree) -> Option<Decree> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .decrees
            .iter()
            .into_iter()
            .find(|current| is_root_decree_ordered(previous, current))
    }

}
