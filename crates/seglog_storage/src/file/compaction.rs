//! Store file compaction.
//!
//! Compaction rewrites the store so it holds only the live entries, in as
//! few records as possible.
//!
//! ## Invariants
//!
//! - Compaction **MUST NOT** change logical state: every live key, value and
//!   counter reads the same afterwards
//! - The commit sequence keeps counting from where it was
//! - The rewritten file gets a fresh epoch
//! - The old file is only replaced once the new one is fully synced

use super::record::{CommitRecord, FileHeader, Op};
use super::snapshot::Snapshot;
use crate::error::StorageResult;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Maximum number of puts written per compacted record.
const OPS_PER_RECORD: usize = 1024;

/// Result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Records in the file before compaction.
    pub records_before: u64,
    /// Records in the file after compaction.
    pub records_after: u64,
    /// File size before compaction.
    pub bytes_before: u64,
    /// File size after compaction.
    pub bytes_after: u64,
    /// Live keys carried over.
    pub live_keys: u64,
}

impl CompactionStats {
    /// Bytes reclaimed by the compaction.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Writes the live contents of `snapshot` to `path` under a fresh epoch.
///
/// The new file is written next to `path`, synced, then renamed over it.
/// Returns the number of records written.
pub(super) fn rewrite(path: &Path, snapshot: &Snapshot) -> StorageResult<u64> {
    let temp_path = sibling(path, ".compact");

    let written = match write_compacted(&temp_path, snapshot) {
        Ok(written) => written,
        Err(err) => {
            if let Err(remove_err) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %remove_err, "failed to remove compaction output");
            }
            return Err(err);
        }
    };

    fs::rename(&temp_path, path)?;
    sync_parent(path)?;

    Ok(written)
}

fn write_compacted(temp_path: &Path, snapshot: &Snapshot) -> StorageResult<u64> {
    let mut out = BufWriter::new(File::create(temp_path)?);
    out.write_all(&FileHeader::fresh().encode())?;

    // Every compacted record carries the current sequence; the next commit
    // continues after it.
    let sequence = snapshot.sequence();
    let mut written = 0u64;
    let mut ops = Vec::with_capacity(OPS_PER_RECORD);

    for (domain, key, value) in snapshot.entries() {
        ops.push(Op::Put {
            domain: domain.to_string(),
            key: key.to_string(),
            value: value.to_vec(),
        });
        if ops.len() == OPS_PER_RECORD {
            let record = CommitRecord {
                sequence,
                ops: std::mem::take(&mut ops),
            };
            out.write_all(&record.encode()?)?;
            written += 1;
        }
    }

    // A store with no live keys still keeps its sequence in an empty record.
    if !ops.is_empty() || (written == 0 && sequence > 0) {
        let record = CommitRecord { sequence, ops };
        out.write_all(&record.encode()?)?;
        written += 1;
    }

    let file = out.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;

    Ok(written)
}

/// Returns `path` with `suffix` appended to its file name.
pub(super) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Syncs the directory holding `path` so a rename is durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StorageResult<()> {
    // NTFS journals metadata; directories cannot be opened for fsync.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("/data/store.db"), ".lock"),
            PathBuf::from("/data/store.db.lock")
        );
    }

    #[test]
    fn bytes_saved_never_underflows() {
        let stats = CompactionStats {
            records_before: 1,
            records_after: 1,
            bytes_before: 10,
            bytes_after: 20,
            live_keys: 0,
        };
        assert_eq!(stats.bytes_saved(), 0);
    }

    #[test]
    fn rewrite_of_empty_snapshot_is_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let written = rewrite(&path, &Snapshot::default()).unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            super::super::record::FILE_HEADER_SIZE as u64
        );
        assert!(!sibling(&path, ".compact").exists());
    }
}
