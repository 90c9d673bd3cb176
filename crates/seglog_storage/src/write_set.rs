//! Staged writes of an open transaction.

use std::collections::BTreeMap;

/// A write staged by a transaction but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    /// Store a value.
    Put(Vec<u8>),
    /// Remove the key.
    Delete,
}

/// The writes staged by one transaction.
///
/// Only the last write per `(domain, key)` is kept, which is exactly the
/// state the transaction leaves behind when applied in call order.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: BTreeMap<(String, String), PendingWrite>,
}

impl WriteSet {
    pub(crate) fn put(&mut self, domain: &str, key: &str, value: &[u8]) {
        self.writes.insert(
            (domain.to_string(), key.to_string()),
            PendingWrite::Put(value.to_vec()),
        );
    }

    pub(crate) fn delete(&mut self, domain: &str, key: &str) {
        self.writes
            .insert((domain.to_string(), key.to_string()), PendingWrite::Delete);
    }

    /// Resolves a read against the staged writes.
    ///
    /// `None` means the transaction has not touched the key and the read
    /// must fall through to committed state.
    pub(crate) fn lookup(&self, domain: &str, key: &str) -> Option<Option<Vec<u8>>> {
        // BTreeMap<(String, String), _> cannot be probed with borrowed parts.
        self.writes
            .get(&(domain.to_string(), key.to_string()))
            .map(|write| match write {
                PendingWrite::Put(value) => Some(value.clone()),
                PendingWrite::Delete => None,
            })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.len()
    }
}

impl IntoIterator for WriteSet {
    type Item = ((String, String), PendingWrite);
    type IntoIter = std::collections::btree_map::IntoIter<(String, String), PendingWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
