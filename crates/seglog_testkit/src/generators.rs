//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity identities, payloads and
//! operation sequences, plus a reference model to check engines against.

use proptest::prelude::*;
use seglog_dal::{Block, Log, Segment};
use seglog_storage::{counter, StorageResult, Tx};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Strategy for generating domain names.
pub fn domain_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating log names, dots included.
pub fn log_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.-]{0,24}").expect("Invalid regex")
}

/// Strategy for generating UUIDs.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for generating block indexes, biased toward small values.
pub fn block_index_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![3 => 0u64..100, 1 => any::<u64>()]
}

/// Strategy for generating values (arbitrary bytes).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating logs.
pub fn log_strategy() -> impl Strategy<Value = Log> {
    (
        domain_strategy(),
        log_name_strategy(),
        proptest::option::of(uuid_strategy()),
    )
        .prop_map(|(domain, name, head)| Log { domain, name, head })
}

/// Strategy for generating segments.
pub fn segment_strategy() -> impl Strategy<Value = Segment> {
    (
        domain_strategy(),
        uuid_strategy(),
        any::<(u64, i64, u64, u64, u64)>(),
        proptest::option::of(uuid_strategy()),
        proptest::option::of(uuid_strategy()),
    )
        .prop_map(
            |(domain, uuid, (transaction, time, blocks, count, bytes), base, next)| Segment {
                domain,
                uuid,
                transaction,
                time,
                blocks,
                count,
                bytes,
                base,
                next,
            },
        )
}

/// Strategy for generating blocks.
pub fn block_strategy() -> impl Strategy<Value = Block> {
    (
        domain_strategy(),
        uuid_strategy(),
        block_index_strategy(),
        value_strategy(),
    )
        .prop_map(|(domain, segment, index, data)| Block {
            domain,
            segment,
            index,
            data,
        })
}

/// A single engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// `set(domain, key, value)`
    Set(String, String, Vec<u8>),
    /// `delete(domain, key)`
    Delete(String, String),
    /// `incr(domain, key)`
    Incr(String, String),
}

/// Strategy for generating operations over a small keyspace, so that
/// overwrites, deletes of existing keys and repeated increments are common.
pub fn kv_op_strategy() -> impl Strategy<Value = KvOp> {
    let domain = prop::sample::select(vec!["a", "b"]).prop_map(String::from);
    let key = prop::sample::select(vec!["k1", "k2", "k3"]).prop_map(String::from);
    let counter_key = prop::sample::select(vec!["c1", "c2"]).prop_map(String::from);

    prop_oneof![
        (domain.clone(), key.clone(), value_strategy())
            .prop_map(|(d, k, v)| KvOp::Set(d, k, v)),
        (domain.clone(), key).prop_map(|(d, k)| KvOp::Delete(d, k)),
        (domain, counter_key).prop_map(|(d, k)| KvOp::Incr(d, k)),
    ]
}

/// Strategy for generating operation sequences.
pub fn kv_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<KvOp>> {
    prop::collection::vec(kv_op_strategy(), 0..max_len)
}

/// Reference model of a domain-scoped key-value store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    entries: BTreeMap<(String, String), Vec<u8>>,
}

impl Model {
    /// Applies `op` and returns the counter value for increments.
    pub fn apply(&mut self, op: &KvOp) -> Option<u64> {
        match op {
            KvOp::Set(d, k, v) => {
                self.entries.insert((d.clone(), k.clone()), v.clone());
                None
            }
            KvOp::Delete(d, k) => {
                self.entries.remove(&(d.clone(), k.clone()));
                None
            }
            KvOp::Incr(d, k) => {
                let entry = (d.clone(), k.clone());
                let next = self
                    .entries
                    .get(&entry)
                    .map_or(0, |bytes| counter::decode(d, k, bytes).expect("model counter"))
                    + 1;
                self.entries.insert(entry, counter::encode(next).to_vec());
                Some(next)
            }
        }
    }

    /// Returns the modelled value of `(domain, key)`.
    pub fn get(&self, domain: &str, key: &str) -> Option<&Vec<u8>> {
        self.entries.get(&(domain.to_string(), key.to_string()))
    }

    /// Iterates over every modelled entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &[u8])> {
        self.entries
            .iter()
            .map(|((d, k), v)| (d.as_str(), k.as_str(), v.as_slice()))
    }
}

/// Applies `op` to an engine or transaction handle.
///
/// # Errors
///
/// Returns the engine's error.
pub fn apply_op<T: Tx + ?Sized>(tx: &T, op: &KvOp) -> StorageResult<Option<u64>> {
    match op {
        KvOp::Set(d, k, v) => tx.set(d, k, v).map(|()| None),
        KvOp::Delete(d, k) => tx.delete(d, k).map(|()| None),
        KvOp::Incr(d, k) => tx.incr(d, k).map(Some),
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self { cases: 256 }
    }
}

impl PropTestConfig {
    /// Creates a quick test configuration (fewer cases).
    pub fn quick() -> Self {
        Self { cases: 32 }
    }

    /// Converts to proptest config.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            ..ProptestConfig::default()
        }
    }
}
