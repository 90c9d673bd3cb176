//! Get, set and delete for logs, segments and blocks.

use crate::codec::{CborCodec, Codec, RawBlockCodec};
use crate::entity::{Block, Log, Segment};
use crate::error::{DalResult, EntityKind};
use crate::keys::{block_key, log_key, segment_key};
use seglog_storage::Tx;
use std::fmt;
use tracing::trace;
use uuid::Uuid;

/// Entity persistence on top of a [`Tx`].
///
/// Every method takes the operation set to run against, so the same calls
/// work on an engine (each call its own transaction) and on a handle inside
/// [`EngineExt::multi`](seglog_storage::EngineExt::multi) (all calls commit
/// together).
///
/// # Example
///
/// ```rust
/// use seglog_dal::{Dal, DalError, Log};
/// use seglog_storage::{EngineExt, MemoryEngine};
///
/// let engine = MemoryEngine::new();
/// let dal = Dal::new();
///
/// engine
///     .multi(|tx| {
///         dal.set_log(tx, "app", &Log::new("app", "events"))?;
///         Ok::<_, DalError>(())
///     })
///     .unwrap();
///
/// let log = dal.get_log(&engine, "app", "events").unwrap().unwrap();
/// assert_eq!(log.name, "events");
/// ```
pub struct Dal {
    logs: Box<dyn Codec<Log>>,
    segments: Box<dyn Codec<Segment>>,
    blocks: Box<dyn Codec<Block>>,
}

impl Default for Dal {
    fn default() -> Self {
        Self {
            logs: Box::new(CborCodec::new(EntityKind::Log)),
            segments: Box::new(CborCodec::new(EntityKind::Segment)),
            blocks: Box::new(RawBlockCodec),
        }
    }
}

impl fmt::Debug for Dal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dal").finish_non_exhaustive()
    }
}

impl Dal {
    /// Creates a DAL with the default codecs: CBOR for logs and segments,
    /// raw bytes for blocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the log codec.
    #[must_use]
    pub fn with_log_codec(mut self, codec: impl Codec<Log> + 'static) -> Self {
        self.logs = Box::new(codec);
        self
    }

    /// Replaces the segment codec.
    #[must_use]
    pub fn with_segment_codec(mut self, codec: impl Codec<Segment> + 'static) -> Self {
        self.segments = Box::new(codec);
        self
    }

    /// Replaces the block codec.
    #[must_use]
    pub fn with_block_codec(mut self, codec: impl Codec<Block> + 'static) -> Self {
        self.blocks = Box::new(codec);
        self
    }

    /// Reads the log called `name`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a decode error if the stored bytes are
    /// not a valid log payload.
    pub fn get_log<T: Tx + ?Sized>(&self, tx: &T, domain: &str, name: &str) -> DalResult<Option<Log>> {
        let Some(bytes) = tx.get(domain, &log_key(name))? else {
            return Ok(None);
        };

        let mut log = self.logs.decode(&bytes)?;
        log.domain = domain.to_string();
        log.name = name.to_string();
        Ok(Some(log))
    }

    /// Stores `log` under its name and returns the encoded size.
    ///
    /// # Errors
    ///
    /// Returns an encode or storage error.
    pub fn set_log<T: Tx + ?Sized>(&self, tx: &T, domain: &str, log: &Log) -> DalResult<usize> {
        let bytes = self.logs.encode(log)?;
        tx.set(domain, &log_key(&log.name), &bytes)?;
        trace!(domain, name = %log.name, bytes = bytes.len(), "log stored");
        Ok(bytes.len())
    }

    /// Deletes the log called `name`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn delete_log<T: Tx + ?Sized>(&self, tx: &T, domain: &str, name: &str) -> DalResult<()> {
        tx.delete(domain, &log_key(name))?;
        Ok(())
    }

    /// Reads segment `id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a decode error if the stored bytes are
    /// not a valid segment payload.
    pub fn get_segment<T: Tx + ?Sized>(
        &self,
        tx: &T,
        domain: &str,
        id: &Uuid,
    ) -> DalResult<Option<Segment>> {
        let Some(bytes) = tx.get(domain, &segment_key(id))? else {
            return Ok(None);
        };

        let mut segment = self.segments.decode(&bytes)?;
        segment.domain = domain.to_string();
        segment.uuid = *id;
        Ok(Some(segment))
    }

    /// Stores `segment` under its UUID and returns the encoded size.
    ///
    /// # Errors
    ///
    /// Returns an encode or storage error.
    pub fn set_segment<T: Tx + ?Sized>(
        &self,
        tx: &T,
        domain: &str,
        segment: &Segment,
    ) -> DalResult<usize> {
        let bytes = self.segments.encode(segment)?;
        tx.set(domain, &segment_key(&segment.uuid), &bytes)?;
        trace!(domain, segment = %segment.uuid, bytes = bytes.len(), "segment stored");
        Ok(bytes.len())
    }

    /// Deletes segment `id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn delete_segment<T: Tx + ?Sized>(&self, tx: &T, domain: &str, id: &Uuid) -> DalResult<()> {
        tx.delete(domain, &segment_key(id))?;
        Ok(())
    }

    /// Reads block `index` of segment `id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a decode error from the block codec.
    pub fn get_block<T: Tx + ?Sized>(
        &self,
        tx: &T,
        domain: &str,
        id: &Uuid,
        index: u64,
    ) -> DalResult<Option<Block>> {
        let Some(bytes) = tx.get(domain, &block_key(id, index))? else {
            return Ok(None);
        };

        let mut block = self.blocks.decode(&bytes)?;
        block.domain = domain.to_string();
        block.segment = *id;
        block.index = index;
        Ok(Some(block))
    }

    /// Stores `block` under its segment and index and returns the encoded
    /// size.
    ///
    /// # Errors
    ///
    /// Returns an encode or storage error.
    pub fn set_block<T: Tx + ?Sized>(&self, tx: &T, domain: &str, block: &Block) -> DalResult<usize> {
        let bytes = self.blocks.encode(block)?;
        tx.set(domain, &block_key(&block.segment, block.index), &bytes)?;
        trace!(
            domain,
            segment = %block.segment,
            index = block.index,
            bytes = bytes.len(),
            "block stored"
        );
        Ok(bytes.len())
    }

    /// Deletes block `index` of segment `id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn delete_block<T: Tx + ?Sized>(
        &self,
        tx: &T,
        domain: &str,
        id: &Uuid,
        index: u64,
    ) -> DalResult<()> {
        tx.delete(domain, &block_key(id, index))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DalError;
    use seglog_storage::{EngineExt, MemoryEngine};

    fn segment(uuid: Uuid) -> Segment {
        Segment {
            transaction: 9,
            time: 1_700_000_000_000,
            blocks: 2,
            count: 120,
            bytes: 4096,
            base: Some(Uuid::from_u128(1)),
            next: None,
            ..Segment::new("d", uuid)
        }
    }

    #[test]
    fn log_roundtrip() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let mut log = Log::new("d", "events");
        log.head = Some(Uuid::from_u128(42));

        let written = dal.set_log(&engine, "d", &log).unwrap();
        assert!(written > 0);
        assert_eq!(dal.get_log(&engine, "d", "events").unwrap(), Some(log));
    }

    #[test]
    fn set_reports_encoded_length() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let log = Log::new("d", "events");

        let written = dal.set_log(&engine, "d", &log).unwrap();
        let stored = engine.get_raw("d", "log.events");
        assert_eq!(written, stored.len());
    }

    #[test]
    fn segment_roundtrip_and_delete() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(0xabc);
        let seg = segment(id);

        dal.set_segment(&engine, "d", &seg).unwrap();
        assert_eq!(dal.get_segment(&engine, "d", &id).unwrap(), Some(seg));

        dal.delete_segment(&engine, "d", &id).unwrap();
        assert_eq!(dal.get_segment(&engine, "d", &id).unwrap(), None);
    }

    #[test]
    fn block_roundtrip_is_raw() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(5);
        let block = Block::new("d", id, 5, b"payload".to_vec());

        assert_eq!(dal.set_block(&engine, "d", &block).unwrap(), 7);
        assert_eq!(engine.get_raw("d", &block_key(&id, 5)), b"payload".to_vec());
        assert_eq!(dal.get_block(&engine, "d", &id, 5).unwrap(), Some(block));
        assert_eq!(dal.get_block(&engine, "d", &id, 50).unwrap(), None);

        dal.delete_block(&engine, "d", &id, 5).unwrap();
        assert_eq!(dal.get_block(&engine, "d", &id, 5).unwrap(), None);
    }

    #[test]
    fn missing_entities_are_absent() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(1);

        assert_eq!(dal.get_log(&engine, "d", "nope").unwrap(), None);
        assert_eq!(dal.get_segment(&engine, "d", &id).unwrap(), None);
        assert_eq!(dal.get_block(&engine, "d", &id, 0).unwrap(), None);
        dal.delete_log(&engine, "d", "nope").unwrap();
    }

    #[test]
    fn malformed_payload_is_decode_error() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        engine.set("d", "log.broken", &[0xff, 0xff]).unwrap();

        let err = dal.get_log(&engine, "d", "broken").unwrap_err();
        assert!(matches!(
            err,
            DalError::Decode {
                kind: EntityKind::Log,
                ..
            }
        ));
    }

    #[test]
    fn domains_are_isolated() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let mut a = Log::new("a", "events");
        a.head = Some(Uuid::from_u128(1));
        dal.set_log(&engine, "a", &a).unwrap();

        assert_eq!(dal.get_log(&engine, "b", "events").unwrap(), None);
    }

    #[test]
    fn multi_batch_is_atomic() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(77);

        let result: DalResult<()> = engine.multi(|tx| {
            dal.set_segment(tx, "d", &segment(id))?;
            Err(DalError::decode(EntityKind::Log, "rejected"))
        });

        assert!(matches!(result, Err(DalError::Decode { .. })));
        assert_eq!(dal.get_segment(&engine, "d", &id).unwrap(), None);
    }

    #[test]
    fn multi_reads_own_writes() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(3);

        let found = engine
            .multi(|tx| {
                dal.set_segment(tx, "d", &segment(id))?;
                let mut log = Log::new("d", "events");
                log.head = dal.get_segment(tx, "d", &id)?.map(|s| s.uuid);
                dal.set_log(tx, "d", &log)?;
                Ok::<_, DalError>(log.head)
            })
            .unwrap();

        assert_eq!(found, Some(id));
        assert_eq!(
            dal.get_log(&engine, "d", "events").unwrap().unwrap().head,
            Some(id)
        );
    }

    struct Utf8LogCodec;

    impl Codec<Log> for Utf8LogCodec {
        fn encode(&self, value: &Log) -> DalResult<Vec<u8>> {
            Ok(value
                .head
                .map(|h| h.to_string())
                .unwrap_or_default()
                .into_bytes())
        }

        fn decode(&self, bytes: &[u8]) -> DalResult<Log> {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DalError::decode(EntityKind::Log, e.to_string()))?;
            let head = if text.is_empty() {
                None
            } else {
                Some(
                    Uuid::parse_str(text)
                        .map_err(|e| DalError::decode(EntityKind::Log, e.to_string()))?,
                )
            };
            Ok(Log {
                head,
                ..Log::default()
            })
        }
    }

    #[test]
    fn custom_codec_is_used() {
        let engine = MemoryEngine::new();
        let dal = Dal::new().with_log_codec(Utf8LogCodec);
        let mut log = Log::new("d", "events");
        log.head = Some(Uuid::from_u128(9));

        dal.set_log(&engine, "d", &log).unwrap();
        assert_eq!(
            engine.get_raw("d", "log.events"),
            Uuid::from_u128(9).to_string().into_bytes()
        );
        assert_eq!(dal.get_log(&engine, "d", "events").unwrap(), Some(log));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_set_traces_its_size() {
        let engine = MemoryEngine::new();
        let dal = Dal::new();
        let id = Uuid::from_u128(3);
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let sizes = tracing::subscriber::with_default(subscriber, || {
            [
                dal.set_log(&engine, "d", &Log::new("d", "events")).unwrap(),
                dal.set_segment(&engine, "d", &segment(id)).unwrap(),
                dal.set_block(&engine, "d", &Block::new("d", id, 4, b"data".to_vec()))
                    .unwrap(),
            ]
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        for (message, size) in ["log stored", "segment stored", "block stored"]
            .iter()
            .zip(sizes)
        {
            let line = output
                .lines()
                .find(|line| line.contains(message))
                .unwrap_or_else(|| panic!("no {message:?} event in {output}"));
            assert!(line.contains(&format!("bytes={size}")), "{line}");
        }
        assert!(output.contains("index=4"));
    }

    trait GetRaw {
        fn get_raw(&self, domain: &str, key: &str) -> Vec<u8>;
    }

    impl GetRaw for MemoryEngine {
        fn get_raw(&self, domain: &str, key: &str) -> Vec<u8> {
            self.get(domain, key).unwrap().unwrap()
        }
    }
}
