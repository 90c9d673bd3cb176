//! In-memory engine for testing.

use crate::engine::{Engine, EngineExt, Transaction, Tx};
use crate::error::StorageResult;
use crate::options::Options;
use crate::write_set::{PendingWrite, WriteSet};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type Domains = HashMap<String, BTreeMap<String, Vec<u8>>>;

/// An in-memory engine.
///
/// This engine keeps every domain in a map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// Readers take a shared lock only for the duration of a lookup. Writers are
/// serialized by a writer mutex held for the whole transaction, and publish
/// their staged writes under a short exclusive lock at commit, so readers
/// never observe a partially applied transaction.
///
/// # Example
///
/// ```rust
/// use seglog_storage::{MemoryEngine, Tx};
///
/// let engine = MemoryEngine::new();
/// engine.set("test", "hello", b"world").unwrap();
/// assert_eq!(engine.get("test", "hello").unwrap(), Some(b"world".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<Domains>,
    writer: Mutex<()>,
}

impl MemoryEngine {
    /// Engine name used by [`crate::open`].
    pub const NAME: &'static str = "memory";

    /// Creates a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine from options.
    ///
    /// The in-memory engine has no options of its own; all are ignored.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other engines.
    pub fn init(_options: &Options) -> StorageResult<Self> {
        Ok(Self::new())
    }

    /// Returns the names of all domains, sorted.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the total number of keys across all domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all domains.
    pub fn clear(&self) {
        let _writer = self.writer.lock();
        self.data.write().clear();
    }

    fn read(&self, domain: &str, key: &str) -> Option<Vec<u8>> {
        self.data
            .read()
            .get(domain)
            .and_then(|keys| keys.get(key))
            .cloned()
    }
}

impl Tx for MemoryEngine {
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read(domain, key))
    }

    fn set(&self, domain: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        self.multi(|tx| tx.set(domain, key, value))
    }

    fn delete(&self, domain: &str, key: &str) -> StorageResult<()> {
        self.multi(|tx| tx.delete(domain, key))
    }

    fn incr(&self, domain: &str, key: &str) -> StorageResult<u64> {
        self.multi(|tx| tx.incr(domain, key))
    }
}

impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        let guard = self.writer.lock();
        Ok(Box::new(MemoryTransaction {
            engine: self,
            _writer: guard,
            writes: RefCell::new(WriteSet::default()),
        }))
    }
}

/// A write transaction on a [`MemoryEngine`].
///
/// Holds the engine's writer lock until it is committed, rolled back or
/// dropped.
pub struct MemoryTransaction<'a> {
    engine: &'a MemoryEngine,
    _writer: MutexGuard<'a, ()>,
    writes: RefCell<WriteSet>,
}

impl Tx for MemoryTransaction<'_> {
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.borrow().lookup(domain, key) {
            return Ok(staged);
        }
        Ok(self.engine.read(domain, key))
    }

    fn set(&self, domain: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        self.writes.borrow_mut().put(domain, key, value);
        Ok(())
    }

    fn delete(&self, domain: &str, key: &str) -> StorageResult<()> {
        self.writes.borrow_mut().delete(domain, key);
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn as_tx(&self) -> &dyn Tx {
        self
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let writes = self.writes.into_inner();
        if writes.is_empty() {
            return Ok(());
        }

        let count = writes.len();
        let mut data = self.engine.data.write();
        for ((domain, key), write) in writes {
            match write {
                PendingWrite::Put(value) => {
                    data.entry(domain).or_default().insert(key, value);
                }
                PendingWrite::Delete => {
                    if let Some(keys) = data.get_mut(&domain) {
                        keys.remove(&key);
                    }
                }
            }
        }

        debug!(writes = count, "memory transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(
            writes = self.writes.borrow().len(),
            "memory transaction rolled back"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn memory_new_is_empty() {
        let engine = MemoryEngine::new();
        assert!(engine.is_empty());
        assert!(engine.domains().is_empty());
    }

    #[test]
    fn memory_set_and_get() {
        let engine = MemoryEngine::new();
        engine.set("test", "hello", b"world").unwrap();
        assert_eq!(engine.get("test", "hello").unwrap(), Some(b"world".to_vec()));
    }

    #[test]
    fn memory_missing_domain_is_absent() {
        let engine = MemoryEngine::new();
        assert_eq!(engine.get("nope", "hello").unwrap(), None);
    }

    #[test]
    fn memory_set_replaces() {
        let engine = MemoryEngine::new();
        engine.set("d", "k", b"first value").unwrap();
        engine.set("d", "k", b"2").unwrap();
        assert_eq!(engine.get("d", "k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn memory_delete() {
        let engine = MemoryEngine::new();
        engine.set("d", "k", b"v").unwrap();
        engine.delete("d", "k").unwrap();
        assert_eq!(engine.get("d", "k").unwrap(), None);

        // Deleting again, or in a missing domain, is fine.
        engine.delete("d", "k").unwrap();
        engine.delete("other", "k").unwrap();
    }

    #[test]
    fn memory_returned_values_are_copies() {
        let engine = MemoryEngine::new();
        engine.set("d", "k", b"abc").unwrap();

        let mut value = engine.get("d", "k").unwrap().unwrap();
        value[0] = b'z';

        assert_eq!(engine.get("d", "k").unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn memory_incr_sequence() {
        let engine = MemoryEngine::new();
        for expected in 1..=5 {
            assert_eq!(engine.incr("d", "counter").unwrap(), expected);
        }
    }

    #[test]
    fn memory_transaction_reads_own_writes() {
        let engine = MemoryEngine::new();
        engine
            .multi(|tx| {
                tx.set("d", "k", b"v")?;
                assert_eq!(tx.get("d", "k")?, Some(b"v".to_vec()));
                tx.delete("d", "k")?;
                assert_eq!(tx.get("d", "k")?, None);
                Ok::<_, StorageError>(())
            })
            .unwrap();
    }

    #[test]
    fn memory_uncommitted_writes_are_invisible() {
        let engine = MemoryEngine::new();
        let txn = engine.begin().unwrap();
        txn.set("d", "k", b"v").unwrap();

        // The writer lock does not block readers.
        assert_eq!(engine.get("d", "k").unwrap(), None);

        txn.commit().unwrap();
        assert_eq!(engine.get("d", "k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn memory_dropped_transaction_discards_writes() {
        let engine = MemoryEngine::new();
        {
            let txn = engine.begin().unwrap();
            txn.set("d", "k", b"v").unwrap();
        }
        assert_eq!(engine.get("d", "k").unwrap(), None);
    }

    #[test]
    fn memory_concurrent_incr_has_no_gaps() {
        let engine = Arc::new(MemoryEngine::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| engine.incr("d", "c").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (1..=200).collect::<Vec<_>>());
    }

    #[test]
    fn memory_clear() {
        let engine = MemoryEngine::new();
        engine.set("a", "k", b"1").unwrap();
        engine.set("b", "k", b"2").unwrap();
        assert_eq!(engine.domains(), vec!["a".to_string(), "b".to_string()]);

        engine.clear();
        assert!(engine.is_empty());
    }
}
