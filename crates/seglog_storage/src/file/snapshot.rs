//! In-memory image of a store file.

use super::reader::RecordReader;
use super::record::{CommitRecord, FileHeader, Op, FILE_HEADER_SIZE};
use crate::error::StorageResult;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;
use uuid::Uuid;

type Domains = HashMap<String, BTreeMap<String, Vec<u8>>>;

/// The state of a store file replayed up to some offset.
///
/// A snapshot is only a cache: it records which incarnation of the file
/// (epoch) and how many bytes of it have been applied, and catches up by
/// replaying records appended since. A changed epoch or a file shorter than
/// the applied offset means the file was rewritten, and the snapshot starts
/// over.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    epoch: Option<Uuid>,
    /// End of the last applied record.
    offset: u64,
    sequence: u64,
    records: u64,
    domains: Domains,
}

impl Snapshot {
    pub(crate) fn get(&self, domain: &str, key: &str) -> Option<Vec<u8>> {
        self.domains
            .get(domain)
            .and_then(|keys| keys.get(key))
            .cloned()
    }

    pub(crate) fn epoch(&self) -> Option<Uuid> {
        self.epoch
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Sequence number of the last applied record.
    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of records applied since the start of the file.
    pub(crate) fn records(&self) -> u64 {
        self.records
    }

    pub(crate) fn domain_count(&self) -> usize {
        self.domains.values().filter(|keys| !keys.is_empty()).count()
    }

    pub(crate) fn live_keys(&self) -> u64 {
        self.domains.values().map(|keys| keys.len() as u64).sum()
    }

    pub(crate) fn live_bytes(&self) -> u64 {
        self.domains
            .values()
            .flat_map(BTreeMap::values)
            .map(|value| value.len() as u64)
            .sum()
    }

    /// Live entries in domain then key order.
    pub(crate) fn entries(&self) -> Vec<(&str, &str, &[u8])> {
        let mut names: Vec<&String> = self.domains.keys().collect();
        names.sort();

        names
            .into_iter()
            .flat_map(|domain| {
                self.domains[domain]
                    .iter()
                    .map(move |(key, value)| (domain.as_str(), key.as_str(), value.as_slice()))
            })
            .collect()
    }

    /// Forgets everything; the next refresh replays the whole file.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Catches up with the records committed to `file`.
    ///
    /// Returns the file length observed. Bytes between [`Self::offset`] and
    /// that length are an incomplete tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds a corrupted
    /// record. Records applied before the corrupted one stay applied.
    pub(crate) fn refresh(&mut self, file: &File) -> StorageResult<u64> {
        let len = file.metadata()?.len();
        if len < FILE_HEADER_SIZE as u64 {
            self.reset();
            return Ok(len);
        }

        let header = read_header(file)?;
        if self.epoch != Some(header.epoch) || len < self.offset {
            self.reset();
            self.epoch = Some(header.epoch);
            self.offset = FILE_HEADER_SIZE as u64;
        }

        let mut reader = RecordReader::new(file, self.offset, len)?;
        let mut replayed = 0u64;
        while let Some((_, record)) = reader.next_record()? {
            self.apply(record);
            self.offset = reader.offset();
            replayed += 1;
        }

        if replayed > 0 {
            debug!(replayed, offset = self.offset, "snapshot refreshed");
        }

        Ok(len)
    }

    /// Applies a record this process just appended at `start..end`.
    ///
    /// If the snapshot is not exactly at `start` (a concurrent refresh may
    /// already have applied it), nothing is applied twice: either the
    /// snapshot is already at `end`, or it is reset and rebuilt on next use.
    pub(crate) fn apply_appended(&mut self, record: CommitRecord, start: u64, end: u64) {
        if self.offset == end {
            return;
        }
        if self.offset != start || self.epoch.is_none() {
            self.reset();
            return;
        }
        self.apply(record);
        self.offset = end;
    }

    fn apply(&mut self, record: CommitRecord) {
        for op in record.ops {
            match op {
                Op::Put { domain, key, value } => {
                    self.domains.entry(domain).or_default().insert(key, value);
                }
                Op::Delete { domain, key } => {
                    if let Some(keys) = self.domains.get_mut(&domain) {
                        keys.remove(&key);
                    }
                }
            }
        }
        self.sequence = self.sequence.max(record.sequence);
        self.records += 1;
    }
}

/// Reads and validates the header of a store file.
pub(crate) fn read_header(file: &File) -> StorageResult<FileHeader> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; FILE_HEADER_SIZE];
    reader.read_exact(&mut buf)?;
    FileHeader::decode(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempfile;

    fn put(sequence: u64, key: &str, value: &[u8]) -> CommitRecord {
        CommitRecord {
            sequence,
            ops: vec![Op::Put {
                domain: "d".into(),
                key: key.into(),
                value: value.to_vec(),
            }],
        }
    }

    fn store(header: &FileHeader, records: &[CommitRecord]) -> File {
        let mut file = tempfile().unwrap();
        file.write_all(&header.encode()).unwrap();
        for record in records {
            file.write_all(&record.encode().unwrap()).unwrap();
        }
        file
    }

    #[test]
    fn empty_file_is_empty_snapshot() {
        let file = tempfile().unwrap();
        let mut snapshot = Snapshot::default();
        assert_eq!(snapshot.refresh(&file).unwrap(), 0);
        assert_eq!(snapshot.epoch(), None);
        assert_eq!(snapshot.live_keys(), 0);
    }

    #[test]
    fn replays_puts_and_deletes() {
        let header = FileHeader::fresh();
        let delete = CommitRecord {
            sequence: 3,
            ops: vec![Op::Delete {
                domain: "d".into(),
                key: "a".into(),
            }],
        };
        let file = store(&header, &[put(1, "a", b"1"), put(2, "b", b"2"), delete]);

        let mut snapshot = Snapshot::default();
        snapshot.refresh(&file).unwrap();

        assert_eq!(snapshot.epoch(), Some(header.epoch));
        assert_eq!(snapshot.get("d", "a"), None);
        assert_eq!(snapshot.get("d", "b"), Some(b"2".to_vec()));
        assert_eq!(snapshot.sequence(), 3);
        assert_eq!(snapshot.records(), 3);
        assert_eq!(snapshot.live_keys(), 1);
        assert_eq!(snapshot.live_bytes(), 1);
    }

    #[test]
    fn incremental_refresh_applies_only_new_records() {
        let header = FileHeader::fresh();
        let mut file = store(&header, &[put(1, "a", b"1")]);

        let mut snapshot = Snapshot::default();
        snapshot.refresh(&file).unwrap();
        let first_offset = snapshot.offset();

        file.write_all(&put(2, "a", b"2").encode().unwrap()).unwrap();
        snapshot.refresh(&file).unwrap();

        assert!(snapshot.offset() > first_offset);
        assert_eq!(snapshot.records(), 2);
        assert_eq!(snapshot.get("d", "a"), Some(b"2".to_vec()));
    }

    #[test]
    fn new_epoch_forces_full_replay() {
        let mut snapshot = Snapshot::default();
        let old = store(&FileHeader::fresh(), &[put(1, "a", b"old"), put(2, "x", b"x")]);
        snapshot.refresh(&old).unwrap();

        let rewritten = store(&FileHeader::fresh(), &[put(2, "a", b"new")]);
        snapshot.refresh(&rewritten).unwrap();

        assert_eq!(snapshot.get("d", "a"), Some(b"new".to_vec()));
        assert_eq!(snapshot.get("d", "x"), None);
        assert_eq!(snapshot.records(), 1);
    }

    #[test]
    fn torn_tail_stops_at_last_complete_record() {
        let header = FileHeader::fresh();
        let mut file = store(&header, &[put(1, "a", b"1")]);
        let torn = put(2, "b", b"2").encode().unwrap();
        file.write_all(&torn[..torn.len() / 2]).unwrap();

        let mut snapshot = Snapshot::default();
        let len = snapshot.refresh(&file).unwrap();

        assert_eq!(len - snapshot.offset(), (torn.len() / 2) as u64);
        assert_eq!(snapshot.get("d", "b"), None);
    }

    #[test]
    fn entries_are_sorted() {
        let header = FileHeader::fresh();
        let other = CommitRecord {
            sequence: 3,
            ops: vec![Op::Put {
                domain: "a".into(),
                key: "z".into(),
                value: b"0".to_vec(),
            }],
        };
        let file = store(&header, &[put(1, "b", b"1"), put(2, "a", b"2"), other]);

        let mut snapshot = Snapshot::default();
        snapshot.refresh(&file).unwrap();

        let keys: Vec<_> = snapshot
            .entries()
            .into_iter()
            .map(|(domain, key, _)| format!("{domain}/{key}"))
            .collect();
        assert_eq!(keys, vec!["a/z", "d/a", "d/b"]);
    }

    #[test]
    fn apply_appended_skips_already_refreshed_record() {
        let header = FileHeader::fresh();
        let mut file = store(&header, &[]);
        let mut snapshot = Snapshot::default();
        snapshot.refresh(&file).unwrap();

        let record = put(1, "a", b"1");
        let bytes = record.encode().unwrap();
        let start = snapshot.offset();
        file.write_all(&bytes).unwrap();
        let end = start + bytes.len() as u64;

        // A concurrent reader got there first.
        snapshot.refresh(&file).unwrap();
        snapshot.apply_appended(record, start, end);

        assert_eq!(snapshot.records(), 1);
        assert_eq!(snapshot.offset(), end);
    }
}
