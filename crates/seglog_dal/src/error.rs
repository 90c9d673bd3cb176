//! Error types for the data access layer.

use seglog_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for DAL operations.
pub type DalResult<T> = Result<T, DalError>;

/// The kind of entity an operation was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A named log.
    Log,
    /// A segment of a log.
    Segment,
    /// A block of a segment.
    Block,
}

impl EntityKind {
    /// Returns the lowercase name used in keys and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Segment => "segment",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in DAL operations.
///
/// A missing entity is not an error; getters return `Ok(None)`.
#[derive(Debug, Error)]
pub enum DalError {
    /// The storage engine failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An entity could not be encoded.
    #[error("failed to encode {kind}: {message}")]
    Encode {
        /// Entity kind being encoded.
        kind: EntityKind,
        /// Description of the failure.
        message: String,
    },

    /// Stored bytes could not be decoded into an entity.
    #[error("failed to decode {kind}: {message}")]
    Decode {
        /// Entity kind being decoded.
        kind: EntityKind,
        /// Description of the failure.
        message: String,
    },
}

impl DalError {
    /// Creates an encode error.
    pub fn encode(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Encode {
            kind,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Decode {
            kind,
            message: message.into(),
        }
    }
}
