//! Pluggable entity payload codecs.
//!
//! A codec turns the payload fields of an entity into bytes and back. The
//! [`Dal`](crate::Dal) holds one codec per entity kind, so stores can swap
//! the payload format without touching key encoding.

use crate::entity::Block;
use crate::error::{DalError, DalResult, EntityKind};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes and decodes the payload of one entity kind.
///
/// `decode` only fills payload fields; identity fields are left at their
/// defaults and set by the caller from the key.
pub trait Codec<T>: Send + Sync {
    /// Encodes the payload of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`DalError::Encode`] if the value cannot be represented.
    fn encode(&self, value: &T) -> DalResult<Vec<u8>>;

    /// Decodes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`DalError::Decode`] if `bytes` is not a valid payload.
    fn decode(&self, bytes: &[u8]) -> DalResult<T>;
}

/// CBOR payloads via serde.
#[derive(Debug, Clone, Copy)]
pub struct CborCodec {
    kind: EntityKind,
}

impl CborCodec {
    /// Creates a codec reporting errors against `kind`.
    #[must_use]
    pub const fn new(kind: EntityKind) -> Self {
        Self { kind }
    }
}

impl<T> Codec<T> for CborCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> DalResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| DalError::encode(self.kind, e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> DalResult<T> {
        ciborium::from_reader(bytes).map_err(|e| DalError::decode(self.kind, e.to_string()))
    }
}

/// Stores block data as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBlockCodec;

impl Codec<Block> for RawBlockCodec {
    fn encode(&self, value: &Block) -> DalResult<Vec<u8>> {
        Ok(value.data.clone())
    }

    fn decode(&self, bytes: &[u8]) -> DalResult<Block> {
        Ok(Block {
            data: bytes.to_vec(),
            ..Block::default()
        })
    }
}
