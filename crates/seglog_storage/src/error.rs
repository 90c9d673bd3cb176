//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Absence of a key is never an error; lookups return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required engine option was not supplied.
    #[error("missing required option: {option}")]
    MissingOption {
        /// Name of the missing option.
        option: String,
    },

    /// An engine option was supplied with a value that cannot be used.
    #[error("invalid value for option {option}: {message}")]
    InvalidOption {
        /// Name of the offending option.
        option: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The requested engine name is not registered.
    #[error("unknown storage engine: {name}")]
    UnknownEngine {
        /// The engine name that was requested.
        name: String,
    },

    /// The store file is corrupted or has an unsupported format.
    #[error("storage corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A complete record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the record in the store file.
        offset: u64,
        /// Checksum stored with the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// A counter key holds a value that is not an encoded counter.
    #[error("invalid counter at {domain}/{key}: expected 8 bytes, got {len}")]
    InvalidCounter {
        /// Domain holding the counter.
        domain: String,
        /// Counter key.
        key: String,
        /// Length of the stored value.
        len: usize,
    },

    /// A counter is already at `u64::MAX` and cannot be incremented.
    #[error("counter {domain}/{key} overflowed")]
    CounterOverflow {
        /// Domain holding the counter.
        domain: String,
        /// Counter key.
        key: String,
    },

    /// A key, domain or value is too large for the store format.
    #[error("payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        len: usize,
    },
}

impl StorageError {
    /// Creates a missing option error.
    pub fn missing_option(option: impl Into<String>) -> Self {
        Self::MissingOption {
            option: option.into(),
        }
    }

    /// Creates an invalid option error.
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_option_names_the_option() {
        let err = StorageError::missing_option("path");
        assert_eq!(err.to_string(), "missing required option: path");
    }

    #[test]
    fn checksum_mismatch_formats_hex() {
        let err = StorageError::ChecksumMismatch {
            offset: 24,
            expected: 0xdead_beef,
            actual: 0x0000_0001,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch at offset 24: expected deadbeef, got 00000001"
        );
    }
}
