//! Entity key encoding.
//!
//! Keys are plain strings, bit-exact with existing stores:
//!
//! | Entity  | Key                       |
//! |---------|---------------------------|
//! | Log     | `log.<name>`              |
//! | Segment | `segment.<uuid>`          |
//! | Block   | `block.<uuid>.<index>`    |
//!
//! UUIDs are written in canonical lowercase hyphenated form and block
//! indexes in base 10 without leading zeros. Log names are written verbatim
//! and may themselves contain `.`, so consumers must not split keys on `.`;
//! [`EntityKey::parse`] relies on the prefixes and the fixed UUID width
//! instead.

use crate::error::EntityKind;
use std::fmt;
use uuid::Uuid;

/// Key prefix for logs.
pub const LOG_PREFIX: &str = "log.";

/// Key prefix for segments.
pub const SEGMENT_PREFIX: &str = "segment.";

/// Key prefix for blocks.
pub const BLOCK_PREFIX: &str = "block.";

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// Returns the key of the log called `name`.
#[must_use]
pub fn log_key(name: &str) -> String {
    format!("{LOG_PREFIX}{name}")
}

/// Returns the key of segment `id`.
#[must_use]
pub fn segment_key(id: &Uuid) -> String {
    format!("{SEGMENT_PREFIX}{}", id.hyphenated())
}

/// Returns the key of block `index` of segment `id`.
#[must_use]
pub fn block_key(id: &Uuid, index: u64) -> String {
    format!("{BLOCK_PREFIX}{}.{index}", id.hyphenated())
}

/// The entity identity a key encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// `log.<name>`
    Log {
        /// Log name.
        name: String,
    },
    /// `segment.<uuid>`
    Segment {
        /// Segment UUID.
        id: Uuid,
    },
    /// `block.<uuid>.<index>`
    Block {
        /// UUID of the owning segment.
        segment: Uuid,
        /// Index of the block within the segment.
        index: u64,
    },
}

impl EntityKey {
    /// Parses a raw engine key.
    ///
    /// Returns `None` for keys that are not entity keys (counters, foreign
    /// keys) or that are not in canonical form, so that a parsed key always
    /// formats back to the exact input.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(name) = key.strip_prefix(LOG_PREFIX) {
            return Some(Self::Log {
                name: name.to_string(),
            });
        }

        if let Some(rest) = key.strip_prefix(SEGMENT_PREFIX) {
            return parse_uuid(rest).map(|id| Self::Segment { id });
        }

        if let Some(rest) = key.strip_prefix(BLOCK_PREFIX) {
            let segment = parse_uuid(rest.get(..UUID_LEN)?)?;
            let index = rest.get(UUID_LEN..)?.strip_prefix('.')?;
            return parse_index(index).map(|index| Self::Block { segment, index });
        }

        None
    }

    /// Returns the kind of entity this key identifies.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Log { .. } => EntityKind::Log,
            Self::Segment { .. } => EntityKind::Segment,
            Self::Block { .. } => EntityKind::Block,
        }
    }

    /// Formats the engine key.
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            Self::Log { name } => log_key(name),
            Self::Segment { id } => segment_key(id),
            Self::Block { segment, index } => block_key(segment, *index),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

fn parse_uuid(s: &str) -> Option<Uuid> {
    if s.len() != UUID_LEN {
        return None;
    }
    let id = Uuid::parse_str(s).ok()?;
    // Rejects uppercase and other accepted-but-not-canonical spellings.
    (id.hyphenated().to_string() == s).then_some(id)
}

fn parse_index(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    #[test]
    fn key_formats_are_exact() {
        assert_eq!(log_key("events"), "log.events");
        assert_eq!(segment_key(&id()), format!("segment.{ID}"));
        assert_eq!(block_key(&id(), 0), format!("block.{ID}.0"));
        assert_eq!(block_key(&id(), 42), format!("block.{ID}.42"));
    }

    #[test]
    fn block_index_does_not_collide() {
        assert_ne!(block_key(&id(), 5), block_key(&id(), 50));
        assert_ne!(block_key(&id(), 1), block_key(&id(), 10));
    }

    #[test]
    fn dotted_log_name_parses_as_log() {
        let key = log_key(&format!("a.{ID}.5"));
        assert_eq!(
            EntityKey::parse(&key),
            Some(EntityKey::Log {
                name: format!("a.{ID}.5")
            })
        );
    }

    #[test]
    fn parse_block() {
        let parsed = EntityKey::parse(&format!("block.{ID}.123")).unwrap();
        assert_eq!(
            parsed,
            EntityKey::Block {
                segment: id(),
                index: 123
            }
        );
        assert_eq!(parsed.kind(), EntityKind::Block);
    }

    #[test]
    fn non_canonical_keys_are_rejected() {
        let upper = ID.to_uppercase();
        for key in [
            format!("segment.{upper}"),
            format!("segment.{}", id().simple()),
            format!("block.{ID}.05"),
            format!("block.{ID}.+5"),
            format!("block.{ID}."),
            format!("block.{ID}"),
            format!("block.{ID}x5"),
            "block.é".to_string(),
            "counter".to_string(),
        ] {
            assert_eq!(EntityKey::parse(&key), None, "{key}");
        }
    }

    #[test]
    fn empty_log_name() {
        assert_eq!(
            EntityKey::parse("log."),
            Some(EntityKey::Log {
                name: String::new()
            })
        );
    }

    fn any_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    proptest! {
        #[test]
        fn block_keys_parse_back(segment in any_uuid(), index in any::<u64>()) {
            let key = block_key(&segment, index);
            prop_assert_eq!(EntityKey::parse(&key), Some(EntityKey::Block { segment, index }));
        }

        #[test]
        fn log_keys_parse_back(name in ".*") {
            let parsed = EntityKey::parse(&log_key(&name)).unwrap();
            prop_assert_eq!(parsed.to_key(), log_key(&name));
        }

        #[test]
        fn distinct_blocks_have_distinct_keys(
            a in any_uuid(),
            b in any_uuid(),
            i in any::<u64>(),
            j in any::<u64>(),
        ) {
            prop_assume!((a, i) != (b, j));
            prop_assert_ne!(block_key(&a, i), block_key(&b, j));
        }

        #[test]
        fn parsed_keys_format_back(key in "(log|segment|block)\\.[0-9a-f.-]{0,48}") {
            if let Some(parsed) = EntityKey::parse(&key) {
                prop_assert_eq!(parsed.to_key(), key);
            }
        }
    }
}
