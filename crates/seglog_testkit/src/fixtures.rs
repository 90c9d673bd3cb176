//! Test fixtures and engine helpers.
//!
//! Provides engines that clean up after themselves, so the same test body
//! can run against every backend.

use seglog_storage::{Engine, FileEngine, MemoryEngine};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the store inside a fixture's temp directory.
pub const STORE_FILE: &str = "store.seglog";

/// A test engine with automatic cleanup.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Box<dyn Engine>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates a new in-memory test engine.
    pub fn memory() -> Self {
        Self {
            engine: Box::new(MemoryEngine::new()),
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test engine in a temp directory.
    ///
    /// Commits are not fsynced; tests don't need to survive power loss.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = FileEngine::new(temp_dir.path().join(STORE_FILE)).with_sync(false);
        Self {
            engine: Box::new(engine),
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns one fixture per backend.
    pub fn all() -> Vec<Self> {
        vec![Self::memory(), Self::file()]
    }

    /// Returns the store path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(STORE_FILE))
    }

    /// Drops the engine and opens a fresh one on the same store.
    ///
    /// For the in-memory engine this loses all data, so persistence tests
    /// should only use file fixtures.
    pub fn reopen(&mut self) {
        self.engine = match self.path() {
            Some(path) => Box::new(FileEngine::new(path).with_sync(false)),
            None => Box::new(MemoryEngine::new()),
        };
    }

    /// Opens a second, independent engine on the same store.
    ///
    /// Stands in for another process sharing the file.
    ///
    /// # Panics
    ///
    /// Panics for the in-memory fixture, which has nothing to share.
    pub fn sibling(&self) -> FileEngine {
        let path = self.path().expect("in-memory fixtures have no store file");
        FileEngine::new(path).with_sync(false)
    }

    /// Returns the backend name.
    pub fn name(&self) -> &'static str {
        self.engine.name()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

/// Runs `f` once against every backend.
///
/// # Example
///
/// ```rust
/// use seglog_storage::Tx;
/// use seglog_testkit::with_each_engine;
///
/// with_each_engine(|engine| {
///     engine.set("d", "k", b"v").unwrap();
///     assert_eq!(engine.get("d", "k").unwrap(), Some(b"v".to_vec()));
/// });
/// ```
pub fn with_each_engine<F>(mut f: F)
where
    F: FnMut(&TestEngine),
{
    for engine in TestEngine::all() {
        f(&engine);
    }
}

/// Returns `true` if `path` holds a store file.
pub fn store_exists(path: &Path) -> bool {
    path.is_file()
}
