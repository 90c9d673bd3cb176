//! Engine selection by name.

use crate::engine::Engine;
use crate::error::{StorageError, StorageResult};
use crate::file::FileEngine;
use crate::memory::MemoryEngine;
use crate::options::{Options, OPTION_ENGINE};
use tracing::debug;

/// Names of the engines [`open`] can create.
pub const ENGINES: &[&str] = &[FileEngine::NAME, MemoryEngine::NAME];

/// Opens the engine named by the [`OPTION_ENGINE`] option.
///
/// Defaults to the file engine. The whole option set is passed to the
/// engine's `init`, so engine-specific options reach it unchanged.
///
/// # Errors
///
/// Returns [`StorageError::UnknownEngine`] for an unregistered name, or the
/// engine's own initialization error.
///
/// # Example
///
/// ```rust
/// use seglog_storage::{open, Options, Tx, OPTION_ENGINE};
///
/// let engine = open(&Options::new().with(OPTION_ENGINE, "memory")).unwrap();
/// assert_eq!(engine.name(), "memory");
/// assert_eq!(engine.incr("d", "c").unwrap(), 1);
/// ```
pub fn open(options: &Options) -> StorageResult<Box<dyn Engine>> {
    let name = options.get(OPTION_ENGINE).unwrap_or(FileEngine::NAME);
    debug!(engine = name, "opening storage engine");

    match name {
        FileEngine::NAME => Ok(Box::new(FileEngine::init(options)?)),
        MemoryEngine::NAME => Ok(Box::new(MemoryEngine::init(options)?)),
        other => Err(StorageError::UnknownEngine {
            name: other.to_string(),
        }),
    }
}
