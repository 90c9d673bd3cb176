//! Store file header and commit record serialization.

use crate::error::{StorageError, StorageResult};
use uuid::Uuid;

/// Magic bytes opening a store file.
pub const FILE_MAGIC: [u8; 4] = *b"SGLF";

/// Magic bytes opening each commit record.
pub const RECORD_MAGIC: [u8; 4] = *b"SGLR";

/// Current store format version.
pub const FORMAT_VERSION: u16 = 1;

/// File header size.
/// magic (4) + version (2) + reserved (2) + epoch (16) = 24 bytes
pub const FILE_HEADER_SIZE: usize = 24;

/// Record header size.
/// magic (4) + version (2) + length (4) = 10 bytes
pub const RECORD_HEADER_SIZE: usize = 10;

/// CRC size.
pub const CRC_SIZE: usize = 4;

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// The fixed header at the start of every store file.
///
/// The epoch identifies one physical incarnation of the file. Rewriting the
/// file (compaction) assigns a new epoch, which tells cached readers that
/// their offsets no longer apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version the file was written with.
    pub version: u16,
    /// Identity of this incarnation of the file.
    pub epoch: Uuid,
}

impl FileHeader {
    /// Creates a header for a freshly written file.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            version: FORMAT_VERSION,
            epoch: Uuid::new_v4(),
        }
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&FILE_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[8..24].copy_from_slice(self.epoch.as_bytes());
        buf
    }

    /// Parses a header.
    ///
    /// # Errors
    ///
    /// Returns a corruption error for bad magic or a future version.
    pub fn decode(buf: &[u8; FILE_HEADER_SIZE]) -> StorageResult<Self> {
        if buf[0..4] != FILE_MAGIC {
            return Err(StorageError::corrupted("not a seglog store: bad file magic"));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > FORMAT_VERSION {
            return Err(StorageError::corrupted(format!(
                "unsupported store version {version}"
            )));
        }

        let mut epoch = [0u8; 16];
        epoch.copy_from_slice(&buf[8..24]);

        Ok(Self {
            version,
            epoch: Uuid::from_bytes(epoch),
        })
    }
}

/// A single mutation inside a commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Store `value` under `key` in `domain`.
    Put {
        /// Target domain.
        domain: String,
        /// Target key.
        key: String,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove `key` from `domain`.
    Delete {
        /// Target domain.
        domain: String,
        /// Target key.
        key: String,
    },
}

impl Op {
    /// Returns the domain the op applies to.
    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            Self::Put { domain, .. } | Self::Delete { domain, .. } => domain,
        }
    }

    /// Returns the key the op applies to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => key,
        }
    }
}

/// The writes of one committed transaction.
///
/// Each write transaction appends exactly one record, so a record is the
/// unit of atomicity: it is either entirely present (and checksummed) or
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit sequence number, increasing across the life of the store.
    pub sequence: u64,
    /// Mutations in application order.
    pub ops: Vec<Op>,
}

impl CommitRecord {
    /// Maximum size of a record payload.
    ///
    /// The record header stores the length in 4 bytes.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PayloadTooLarge`] if a domain, key or value
    /// exceeds its length field, or the whole payload exceeds
    /// [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_payload(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.to_le_bytes());

        let count =
            u32::try_from(self.ops.len()).map_err(|_| StorageError::PayloadTooLarge {
                len: self.ops.len(),
            })?;
        buf.extend_from_slice(&count.to_le_bytes());

        for op in &self.ops {
            match op {
                Op::Put { domain, key, value } => {
                    buf.push(TAG_PUT);
                    put_domain(&mut buf, domain)?;
                    put_bytes(&mut buf, key.as_bytes())?;
                    put_bytes(&mut buf, value)?;
                }
                Op::Delete { domain, key } => {
                    buf.push(TAG_DELETE);
                    put_domain(&mut buf, domain)?;
                    put_bytes(&mut buf, key.as_bytes())?;
                }
            }
        }

        if buf.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(StorageError::PayloadTooLarge { len: buf.len() });
        }

        Ok(buf)
    }

    /// Deserializes a record payload.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload is truncated, has an unknown
    /// op tag, holds non-UTF-8 names, or has trailing bytes.
    pub fn decode_payload(payload: &[u8]) -> StorageResult<Self> {
        let mut reader = PayloadReader::new(payload);

        let sequence = reader.read_u64()?;
        let count = reader.read_u32()? as usize;
        // Each op needs at least tag + two length fields.
        let mut ops = Vec::with_capacity(count.min(payload.len() / 7));

        for _ in 0..count {
            let tag = reader.read_u8()?;
            let domain_len = reader.read_u16()? as usize;
            let domain = reader.read_string(domain_len)?;
            let key_len = reader.read_u32()? as usize;
            let key = reader.read_string(key_len)?;

            match tag {
                TAG_PUT => {
                    let value_len = reader.read_u32()? as usize;
                    let value = reader.take(value_len)?.to_vec();
                    ops.push(Op::Put { domain, key, value });
                }
                TAG_DELETE => ops.push(Op::Delete { domain, key }),
                other => {
                    return Err(StorageError::corrupted(format!(
                        "unknown op tag {other} in record {sequence}"
                    )));
                }
            }
        }

        if reader.position() != payload.len() {
            return Err(StorageError::corrupted(format!(
                "trailing bytes in record {sequence}: expected {} bytes, got {}",
                reader.position(),
                payload.len()
            )));
        }

        Ok(Self { sequence, ops })
    }

    /// Serializes the full record: header, payload and CRC.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let mut data = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len() + CRC_SIZE);

        data.extend_from_slice(&RECORD_MAGIC);
        data.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        // Safe: encode_payload enforces MAX_PAYLOAD_SIZE.
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);

        // CRC32 over everything before it
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        Ok(data)
    }
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            position: 0,
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, n: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| StorageError::corrupted("unexpected end of record payload"))?;
        let bytes = &self.payload[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> StorageResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> StorageResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> StorageResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> StorageResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn read_string(&mut self, len: usize) -> StorageResult<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| StorageError::corrupted("record holds a non-UTF-8 name"))
    }
}

fn put_domain(buf: &mut Vec<u8>, domain: &str) -> StorageResult<()> {
    let len = u16::try_from(domain.len())
        .map_err(|_| StorageError::PayloadTooLarge { len: domain.len() })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(domain.as_bytes());
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    let len =
        u32::try_from(bytes.len()).map_err(|_| StorageError::PayloadTooLarge { len: bytes.len() })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}
