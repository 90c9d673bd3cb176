//! Persisted counter encoding.
//!
//! Counters are stored as ordinary values: an 8-byte big-endian `u64`.
//! Because they live in the store, their lifetime is the store's lifetime,
//! and every increment reads the persisted value inside the writer's
//! transaction.

use crate::error::{StorageError, StorageResult};

/// Size of an encoded counter in bytes.
pub const COUNTER_SIZE: usize = 8;

/// Encodes a counter value.
#[must_use]
pub const fn encode(value: u64) -> [u8; COUNTER_SIZE] {
    value.to_be_bytes()
}

/// Decodes a stored counter value.
///
/// # Errors
///
/// Returns [`StorageError::InvalidCounter`] if `bytes` is not exactly
/// [`COUNTER_SIZE`] long.
pub fn decode(domain: &str, key: &str, bytes: &[u8]) -> StorageResult<u64> {
    let raw: [u8; COUNTER_SIZE] = bytes.try_into().map_err(|_| StorageError::InvalidCounter {
        domain: domain.to_string(),
        key: key.to_string(),
        len: bytes.len(),
    })?;
    Ok(u64::from_be_bytes(raw))
}

/// Computes the value following `current` (absent counts as zero).
///
/// # Errors
///
/// Returns [`StorageError::InvalidCounter`] if `current` is not a counter,
/// or [`StorageError::CounterOverflow`] if it is already at `u64::MAX`.
pub fn next(domain: &str, key: &str, current: Option<&[u8]>) -> StorageResult<u64> {
    let value = match current {
        Some(bytes) => decode(domain, key, bytes)?,
        None => 0,
    };

    value
        .checked_add(1)
        .ok_or_else(|| StorageError::CounterOverflow {
            domain: domain.to_string(),
            key: key.to_string(),
        })
}
