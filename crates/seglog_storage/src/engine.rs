//! Engine and transaction trait definitions.

use crate::counter;
use crate::error::{StorageError, StorageResult};

/// Domain-scoped key-value operations.
///
/// `Tx` is the operation set shared by engines and transaction handles.
/// Engines implement it with auto-commit semantics: every call is its own
/// transaction. Transaction handles implement it against one open write
/// transaction, so every call made through a handle commits or rolls back
/// together.
///
/// # Invariants
///
/// - `get` returns `Ok(None)` for a missing domain or key, never an error
/// - returned values are owned copies; mutating them never affects the store
/// - `set` replaces the whole value and creates the domain if needed
/// - `delete` of a missing key succeeds
pub trait Tx {
    /// Reads the value stored under `key` in `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` in `domain`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be persisted.
    fn set(&self, domain: &str, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key` from `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete cannot be persisted.
    fn delete(&self, domain: &str, key: &str) -> StorageResult<()>;

    /// Increments the counter stored under `key` and returns the new value.
    ///
    /// Counters start at zero, so the first call returns 1. The default
    /// implementation is a read-modify-write through [`Tx::get`] and
    /// [`Tx::set`]; it is atomic when called on a transaction handle.
    /// Engines override it to run inside their own write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidCounter`] if the key holds a value that
    /// is not a counter, or an I/O error if the store cannot be updated.
    fn incr(&self, domain: &str, key: &str) -> StorageResult<u64> {
        let current = self.get(domain, key)?;
        let next = counter::next(domain, key, current.as_deref())?;
        self.set(domain, key, &counter::encode(next))?;
        Ok(next)
    }
}

/// An open write transaction.
///
/// Handles are created by [`Engine::begin`]. Writes are staged inside the
/// handle and only become visible to other readers on [`Transaction::commit`].
/// Dropping a handle without committing discards every staged write.
pub trait Transaction: Tx {
    /// Returns this handle as a plain operation set.
    fn as_tx(&self) -> &dyn Tx;

    /// Atomically applies all staged writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the writes cannot be persisted. In that case none
    /// of them are visible.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all staged writes.
    fn rollback(self: Box<Self>);
}

/// A transactional, domain-scoped key-value engine.
///
/// Engines allow many concurrent readers and a single writer at a time.
/// [`Engine::begin`] blocks until the writer slot is free.
///
/// # Implementors
///
/// - [`crate::MemoryEngine`] - For testing and ephemeral stores
/// - [`crate::FileEngine`] - For persistent single-file stores
pub trait Engine: Tx + Send + Sync {
    /// Short name of the engine implementation.
    fn name(&self) -> &'static str;

    /// Opens a write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be opened or locked.
    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>>;
}

/// Batch operations available on every [`Engine`].
pub trait EngineExt: Engine {
    /// Runs `f` inside a single write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back if it
    /// returns `Err` (or panics). The callback's error is returned unchanged,
    /// so higher layers can raise their own error types from inside the batch.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, or a [`StorageError`] if the
    /// transaction cannot be opened or committed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use seglog_storage::{EngineExt, MemoryEngine, StorageError, Tx};
    ///
    /// let engine = MemoryEngine::new();
    /// let id = engine
    ///     .multi(|tx| {
    ///         let id = tx.incr("app", "next_id")?;
    ///         tx.set("app", &format!("item.{id}"), b"payload")?;
    ///         Ok::<_, StorageError>(id)
    ///     })
    ///     .unwrap();
    /// assert_eq!(id, 1);
    /// assert!(engine.get("app", "item.1").unwrap().is_some());
    /// ```
    fn multi<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Tx) -> Result<T, E>,
        E: From<StorageError>,
    {
        let txn = self.begin()?;
        match f(txn.as_tx()) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }
}

impl<T: Engine + ?Sized> EngineExt for T {}
