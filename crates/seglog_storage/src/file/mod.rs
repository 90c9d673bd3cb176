//! Single-file persistent engine.
//!
//! The store is one append-only file of checksummed commit records, one per
//! write transaction, preceded by a small header. A sidecar `<path>.lock`
//! file serializes writers across threads and processes.

mod compaction;
mod reader;
mod record;
mod snapshot;

pub use compaction::CompactionStats;
pub use record::{CommitRecord, FileHeader, Op};

use crate::engine::{Engine, EngineExt, Transaction, Tx};
use crate::error::StorageResult;
use crate::options::{Options, OPTION_PATH, OPTION_SYNC};
use crate::write_set::{PendingWrite, WriteSet};
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use record::FILE_HEADER_SIZE;
use snapshot::Snapshot;
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Summary of a store file, produced by [`FileEngine::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Size of the file in bytes.
    pub file_size: u64,
    /// Epoch of the file, if it has a header.
    pub epoch: Option<Uuid>,
    /// Number of complete records.
    pub records: u64,
    /// Sequence number of the last record.
    pub last_sequence: u64,
    /// Number of domains holding at least one key.
    pub domains: usize,
    /// Number of live keys.
    pub live_keys: u64,
    /// Total size of live values.
    pub live_bytes: u64,
    /// Bytes of an incomplete trailing record.
    pub tail_bytes: u64,
}

/// A persistent engine backed by a single file.
///
/// # Concurrency
///
/// - Readers take no file lock. Each read catches the cached snapshot up
///   with records committed since the last read, so it always sees the
///   latest committed state and is never blocked by an open writer.
/// - Writers hold an exclusive lock on `<path>.lock` from [`Engine::begin`]
///   until commit or rollback. The lock file is never replaced, so writers
///   in other processes (and compaction) are serialized too.
///
/// # Durability
///
/// A commit appends one record and, unless the `sync` option is `false`,
/// fsyncs the file before returning. A crash mid-append leaves a torn tail
/// that readers ignore and the next writer truncates.
///
/// # Example
///
/// ```no_run
/// use seglog_storage::{FileEngine, Tx};
///
/// let engine = FileEngine::new("seglog.db");
/// engine.set("test", "hello", b"world").unwrap();
/// assert_eq!(engine.incr("test", "counter").unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct FileEngine {
    path: PathBuf,
    lock_path: PathBuf,
    sync_on_commit: bool,
    snapshot: Mutex<Snapshot>,
}

impl FileEngine {
    /// Engine name used by [`crate::open`].
    pub const NAME: &'static str = "file";

    /// Creates an engine for the store at `path`.
    ///
    /// Nothing is touched on disk until the first write; reading a store
    /// that does not exist yet finds every key absent.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = compaction::sibling(&path, ".lock");
        Self {
            path,
            lock_path,
            sync_on_commit: true,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Sets whether commits are fsynced before returning.
    #[must_use]
    pub fn with_sync(mut self, sync_on_commit: bool) -> Self {
        self.sync_on_commit = sync_on_commit;
        self
    }

    /// Creates an engine from options.
    ///
    /// Reads [`OPTION_PATH`] (required) and [`OPTION_SYNC`] (default `true`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::MissingOption`] if no path is given, or
    /// [`crate::StorageError::InvalidOption`] if `sync` is not a boolean.
    pub fn init(options: &Options) -> StorageResult<Self> {
        let path = options.require(OPTION_PATH)?;
        let sync_on_commit = options.get_bool(OPTION_SYNC)?.unwrap_or(true);
        debug!(path, sync_on_commit, "file engine initialized");
        Ok(Self::new(path).with_sync(sync_on_commit))
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the store so it holds only live entries.
    ///
    /// Holds the writer lock for the duration, so it is safe to run while
    /// other engines (in this or other processes) use the same store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read, is corrupted, or the
    /// rewritten file cannot be persisted. On error the original file is
    /// left in place.
    pub fn compact(&self) -> StorageResult<CompactionStats> {
        let _lock = self.lock_writer()?;
        let mut file = self.open_for_write()?;
        let mut snapshot = self.snapshot.lock();
        self.prepare(&mut file, &mut snapshot)?;

        let bytes_before = file.metadata()?.len();
        let records_before = snapshot.records();
        let live_keys = snapshot.live_keys();
        drop(file);

        let records_after = compaction::rewrite(&self.path, &snapshot)?;
        let bytes_after = std::fs::metadata(&self.path)?.len();

        // The file now has a new epoch; replay it on next use.
        snapshot.reset();

        let stats = CompactionStats {
            records_before,
            records_after,
            bytes_before,
            bytes_after,
            live_keys,
        };
        info!(
            path = %self.path.display(),
            records_before,
            records_after,
            bytes_saved = stats.bytes_saved(),
            "store compacted"
        );
        Ok(stats)
    }

    /// Scans the store at `path` without modifying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is corrupted.
    pub fn inspect(path: &Path) -> StorageResult<StoreStats> {
        let file = File::open(path)?;
        let mut snapshot = Snapshot::default();
        let file_size = snapshot.refresh(&file)?;

        Ok(StoreStats {
            file_size,
            epoch: snapshot.epoch(),
            records: snapshot.records(),
            last_sequence: snapshot.sequence(),
            domains: snapshot.domain_count(),
            live_keys: snapshot.live_keys(),
            live_bytes: snapshot.live_bytes(),
            tail_bytes: file_size.saturating_sub(snapshot.offset()),
        })
    }

    /// Returns the header and every complete record of the store at `path`,
    /// each with its file offset.
    ///
    /// A file too short to hold a header yields no header and no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is corrupted.
    pub fn records(path: &Path) -> StorageResult<(Option<FileHeader>, Vec<(u64, CommitRecord)>)> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < FILE_HEADER_SIZE as u64 {
            return Ok((None, Vec::new()));
        }

        let header = snapshot::read_header(&file)?;
        let mut reader = reader::RecordReader::new(&file, FILE_HEADER_SIZE as u64, len)?;
        let mut records = Vec::new();
        while let Some(entry) = reader.next_record()? {
            records.push(entry);
        }

        Ok((Some(header), records))
    }

    fn read(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        // Open under the snapshot lock: a writer on this engine catches the
        // snapshot up after any refresh from a file a compaction replaced.
        let mut snapshot = self.snapshot.lock();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                snapshot.reset();
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        snapshot.refresh(&file)?;
        Ok(snapshot.get(domain, key))
    }

    fn lock_writer(&self) -> StorageResult<File> {
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    fn open_for_write(&self) -> StorageResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }

    /// Brings the file and the snapshot to a state a writer can append to.
    ///
    /// Must be called with the writer lock held.
    fn prepare(&self, file: &mut File, snapshot: &mut Snapshot) -> StorageResult<()> {
        let len = file.metadata()?.len();
        if len < FILE_HEADER_SIZE as u64 {
            if len > 0 {
                warn!(path = %self.path.display(), len, "discarding incomplete store header");
            }
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&FileHeader::fresh().encode())?;
            file.sync_all()?;
        }

        let len = snapshot.refresh(file)?;
        let valid = snapshot.offset();
        if valid < len {
            warn!(
                path = %self.path.display(),
                offset = valid,
                discarded = len - valid,
                "truncating incomplete trailing record"
            );
            file.set_len(valid)?;
            file.sync_all()?;
        }

        Ok(())
    }
}

impl Tx for FileEngine {
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.read(domain, key)
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

impl Engine for FileEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        let lock = self.lock_writer()?;
        let mut file = self.open_for_write()?;
        self.prepare(&mut file, &mut self.snapshot.lock())?;

        Ok(Box::new(FileTransaction {
            engine: self,
            file,
            _lock: lock,
            writes: RefCell::new(WriteSet::default()),
        }))
    }
}

/// A write transaction on a [`FileEngine`].
///
/// Holds the store's writer lock until it is committed, rolled back or
/// dropped.
pub struct FileTransaction<'a> {
    engine: &'a FileEngine,
    file: File,
    _lock: File,
    writes: RefCell<WriteSet>,
}

impl FileTransaction<'_> {
    /// Locks the engine snapshot and brings it in line with this
    /// transaction's file.
    ///
    /// The writer lock pins the file, so whatever another reader did to the
    /// shared snapshot, this yields the latest committed state.
    fn snapshot(&self) -> StorageResult<MutexGuard<'_, Snapshot>> {
        let mut snapshot = self.engine.snapshot.lock();
        snapshot.refresh(&self.file)?;
        Ok(snapshot)
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        if self.engine.sync_on_commit {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

impl Tx for FileTransaction<'_> {
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.borrow().lookup(domain, key) {
            return Ok(staged);
        }
        Ok(self.snapshot()?.get(domain, key))
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

impl Transaction for FileTransaction<'_> {
    fn as_tx(&self) -> &dyn Tx {
        self
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let writes = self.writes.replace(WriteSet::default());
        if writes.is_empty() {
            return Ok(());
        }

        let sequence = self.snapshot()?.sequence() + 1;
        let ops: Vec<Op> = writes
            .into_iter()
            .map(|((domain, key), write)| match write {
                PendingWrite::Put(value) => Op::Put { domain, key, value },
                PendingWrite::Delete => Op::Delete { domain, key },
            })
            .collect();
        let record = CommitRecord { sequence, ops };
        let bytes = record.encode()?;

        let start = self.file.seek(SeekFrom::End(0))?;
        if let Err(err) = self.append(&bytes) {
            // Leave no partial record behind for readers to trip over.
            if let Err(truncate_err) = self.file.set_len(start) {
                warn!(
                    path = %self.engine.path.display(),
                    error = %truncate_err,
                    "failed to roll back partial append"
                );
            }
            return Err(err.into());
        }
        let end = start + bytes.len() as u64;

        let ops = record.ops.len();
        self.engine
            .snapshot
            .lock()
            .apply_appended(record, start, end);

        debug!(sequence, ops, bytes = bytes.len(), "file transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(
            writes = self.writes.borrow().len(),
            "file transaction rolled back"
        );
    }
}
