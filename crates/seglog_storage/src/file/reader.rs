//! Sequential commit record reader.
//!
//! ## Recovery Policy
//!
//! ### Tolerated (treated as a clean end of the log)
//!
//! - **Truncated header**: fewer than 10 bytes left at the end
//! - **Truncated record**: the length field runs past the end of the file
//!
//! Both are what a crash (or a concurrent writer) mid-append leaves behind.
//! The reader stops before the incomplete record; writers truncate it.
//!
//! ### Fatal
//!
//! - **Invalid magic** or **unsupported version** in a record header
//! - **CRC mismatch** over a complete record
//! - **Malformed payload** inside a record whose checksum matched
//!
//! These indicate real corruption and are returned as errors rather than
//! silently dropping committed data.

use super::record::{
    CommitRecord, CRC_SIZE, FORMAT_VERSION, RECORD_HEADER_SIZE, RECORD_MAGIC,
};
use crate::error::{StorageError, StorageResult};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

/// Read buffer size for replay.
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// Reads commit records from a store file, one at a time.
///
/// The reader is bounded by the file length observed when it was created, so
/// records appended concurrently are left for the next refresh.
pub(crate) struct RecordReader<'f> {
    reader: BufReader<&'f File>,
    /// Offset of the next unread record.
    offset: u64,
    /// End of the readable region.
    end: u64,
}

impl<'f> RecordReader<'f> {
    /// Creates a reader over `file` covering `start..end`.
    pub(crate) fn new(file: &'f File, start: u64, end: u64) -> StorageResult<Self> {
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        reader.seek(SeekFrom::Start(start))?;
        Ok(Self {
            reader,
            offset: start,
            end,
        })
    }

    /// Offset just past the last complete record returned.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(Some((offset, record)))` for a valid record, `Ok(None)` at
    /// the end of the log or on a truncated tail, and `Err(..)` on corruption
    /// or I/O failure.
    pub(crate) fn next_record(&mut self) -> StorageResult<Option<(u64, CommitRecord)>> {
        let start = self.offset;
        let remaining = self.end.saturating_sub(start);

        if remaining < RECORD_HEADER_SIZE as u64 {
            return Ok(None);
        }

        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.reader.read_exact(&mut header)?;

        if header[0..4] != RECORD_MAGIC {
            return Err(StorageError::corrupted(format!(
                "invalid record magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > FORMAT_VERSION {
            return Err(StorageError::corrupted(format!(
                "unsupported record version {version} at offset {start}"
            )));
        }

        let payload_len =
            u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let total_len = (RECORD_HEADER_SIZE + payload_len + CRC_SIZE) as u64;

        if remaining < total_len {
            // Incomplete record: crash or in-flight append.
            return Ok(None);
        }

        let mut body = vec![0u8; payload_len + CRC_SIZE];
        self.reader.read_exact(&mut body)?;

        let (payload, crc) = body.split_at(payload_len);
        let stored_crc = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let computed_crc = hasher.finalize();

        if stored_crc != computed_crc {
            return Err(StorageError::ChecksumMismatch {
                offset: start,
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = CommitRecord::decode_payload(payload)?;
        self.offset += total_len;

        Ok(Some((start, record)))
    }
}
