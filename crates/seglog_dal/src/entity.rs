//! Log, segment and block entities.
//!
//! Identity fields (domain, name, UUIDs, index) come from the key an entity
//! is stored under and are never part of the encoded payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, append-only log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Domain the log lives in.
    #[serde(skip)]
    pub domain: String,
    /// Log name, unique within its domain.
    #[serde(skip)]
    pub name: String,
    /// The most recent segment of the log.
    pub head: Option<Uuid>,
}

impl Log {
    /// Creates an empty log.
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            head: None,
        }
    }
}

/// A batch of facts written to a log by one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Domain the segment lives in.
    #[serde(skip)]
    pub domain: String,
    /// Segment identity, generated by the caller.
    #[serde(skip)]
    pub uuid: Uuid,
    /// Transaction that produced the segment.
    pub transaction: u64,
    /// Commit time in unix milliseconds.
    pub time: i64,
    /// Number of blocks in the segment.
    pub blocks: u64,
    /// Number of facts in the segment.
    pub count: u64,
    /// Total size of the segment's blocks in bytes.
    pub bytes: u64,
    /// Segment this one was derived from.
    pub base: Option<Uuid>,
    /// Following segment in the log.
    pub next: Option<Uuid>,
}

impl Segment {
    /// Creates an empty segment.
    #[must_use]
    pub fn new(domain: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            domain: domain.into(),
            uuid,
            ..Self::default()
        }
    }
}

/// One chunk of a segment's data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Domain the block lives in.
    #[serde(skip)]
    pub domain: String,
    /// Segment the block belongs to.
    #[serde(skip)]
    pub segment: Uuid,
    /// Position of the block within its segment.
    #[serde(skip)]
    pub index: u64,
    /// Block contents.
    pub data: Vec<u8>,
}

impl Block {
    /// Creates a block.
    #[must_use]
    pub fn new(domain: impl Into<String>, segment: Uuid, index: u64, data: Vec<u8>) -> Self {
        Self {
            domain: domain.into(),
            segment,
            index,
            data,
        }
    }
}
