//! Key-value commands: get, set, incr and delete.

use super::render_value;
use seglog_storage::{counter, Engine, Options, StorageResult, Tx, OPTION_PATH};
use std::path::Path;
use tracing::debug;

/// A single key-value operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCommand {
    /// Print the value of a key.
    Get {
        /// Domain to read from.
        domain: String,
        /// Key to read.
        key: String,
        /// Decode the value as a counter.
        counter: bool,
    },
    /// Store a value.
    Set {
        /// Domain to write to.
        domain: String,
        /// Key to write.
        key: String,
        /// Value, stored as its UTF-8 bytes.
        value: String,
    },
    /// Increment a counter and print the new value.
    Incr {
        /// Domain holding the counter.
        domain: String,
        /// Counter key.
        key: String,
    },
    /// Remove a key.
    Delete {
        /// Domain to delete from.
        domain: String,
        /// Key to delete.
        key: String,
    },
}

/// Opens the store at `path` through the engine registry.
pub fn open_engine(path: &Path) -> StorageResult<Box<dyn Engine>> {
    let options = Options::new().with(OPTION_PATH, path.to_string_lossy());
    seglog_storage::open(&options)
}

/// Runs a key-value command and returns the line to print, if any.
pub fn execute(engine: &dyn Engine, command: &KvCommand) -> StorageResult<Option<String>> {
    match command {
        KvCommand::Get {
            domain,
            key,
            counter: as_counter,
        } => {
            let Some(value) = engine.get(domain, key)? else {
                return Ok(None);
            };
            if *as_counter {
                Ok(Some(counter::decode(domain, key, &value)?.to_string()))
            } else {
                Ok(Some(render_value(&value)))
            }
        }
        KvCommand::Set { domain, key, value } => {
            engine.set(domain, key, value.as_bytes())?;
            Ok(None)
        }
        KvCommand::Incr { domain, key } => Ok(Some(engine.incr(domain, key)?.to_string())),
        KvCommand::Delete { domain, key } => {
            engine.delete(domain, key)?;
            Ok(None)
        }
    }
}

/// Runs a key-value command against the store at `path`.
pub fn run(path: &Path, command: &KvCommand) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(path)?;
    debug!(path = %path.display(), engine = engine.name(), "store opened");
    match execute(engine.as_ref(), command)? {
        Some(line) => println!("{line}"),
        None if matches!(command, KvCommand::Get { .. }) => {
            return Err("key not found".into());
        }
        None => {}
    }
    Ok(())
}
