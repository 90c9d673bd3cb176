//! # Seglog Storage
//!
//! Transactional, domain-scoped key-value engines for seglog.
//!
//! This crate is the lowest layer of seglog. Engines store opaque bytes
//! under `(domain, key)` pairs; they know nothing about logs, segments or
//! blocks.
//!
//! ## Design Principles
//!
//! - Absence is not an error: reads return `Ok(None)`
//! - Every value handed out is an owned copy
//! - Many readers, one writer; readers never wait for an open writer
//! - Counters are ordinary persisted values, incremented inside the
//!   writer's transaction
//! - `multi` batches commit together or not at all
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral stores
//! - [`FileEngine`] - For persistent single-file stores
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::{EngineExt, MemoryEngine, Tx};
//!
//! let engine = MemoryEngine::new();
//! engine.set("test", "hello", b"world").unwrap();
//! assert_eq!(engine.incr("test", "counter").unwrap(), 1);
//!
//! engine
//!     .multi(|tx| {
//!         tx.delete("test", "hello")?;
//!         tx.incr("test", "counter")
//!     })
//!     .unwrap();
//! assert_eq!(engine.get("test", "hello").unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod counter;
mod engine;
mod error;
mod file;
mod memory;
mod options;
mod registry;
mod write_set;

pub use engine::{Engine, EngineExt, Transaction, Tx};
pub use error::{StorageError, StorageResult};
pub use file::{CommitRecord, CompactionStats, FileEngine, FileHeader, FileTransaction, Op, StoreStats};
pub use memory::{MemoryEngine, MemoryTransaction};
pub use options::{Options, OPTION_ENGINE, OPTION_PATH, OPTION_SYNC};
pub use registry::{open, ENGINES};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
