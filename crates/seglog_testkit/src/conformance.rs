//! Backend conformance checks.
//!
//! Every engine must pass these. Each check takes a fresh, empty engine and
//! panics with a descriptive message on the first violation.

use crate::fixtures::TestEngine;
use crate::generators::{apply_op, KvOp, Model};
use seglog_dal::{Block, Dal, DalError, Log, Segment};
use seglog_storage::{Engine, EngineExt, StorageError, Tx};
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// Set, get, increment and delete through the auto-commit surface.
pub fn check_end_to_end(engine: &dyn Engine) {
    engine.set("test", "hello", b"world").expect("set");
    assert_eq!(
        engine.get("test", "hello").expect("get"),
        Some(b"world".to_vec()),
        "{}: value not readable after set",
        engine.name()
    );

    assert_eq!(engine.incr("test", "counter").expect("incr"), 1);
    assert_eq!(engine.incr("test", "counter").expect("incr"), 2);

    engine.delete("test", "hello").expect("delete");
    assert_eq!(
        engine.get("test", "hello").expect("get"),
        None,
        "{}: value still present after delete",
        engine.name()
    );
}

/// Missing domains and keys read as absent; deleting them succeeds.
pub fn check_absence(engine: &dyn Engine) {
    assert_eq!(engine.get("never", "written").expect("get"), None);

    engine.set("d", "present", b"x").expect("set");
    assert_eq!(engine.get("d", "absent").expect("get"), None);

    engine.delete("never", "written").expect("delete in missing domain");
    engine.delete("d", "absent").expect("delete of missing key");

    let dal = Dal::new();
    let id = Uuid::from_u128(0x5e9);
    assert_eq!(dal.get_log(engine, "d", "nope").expect("get_log"), None);
    assert_eq!(dal.get_segment(engine, "d", &id).expect("get_segment"), None);
    assert_eq!(dal.get_block(engine, "d", &id, 0).expect("get_block"), None);
}

/// Mutating a returned buffer never changes stored data.
pub fn check_copy_isolation(engine: &dyn Engine) {
    engine.set("d", "k", b"abc").expect("set");

    let mut first = engine.get("d", "k").expect("get").expect("present");
    first[0] = b'z';
    first.push(b'!');

    assert_eq!(
        engine.get("d", "k").expect("get"),
        Some(b"abc".to_vec()),
        "{}: returned buffer aliases stored data",
        engine.name()
    );
}

/// The same key in two domains holds independent values.
pub fn check_domain_isolation(engine: &dyn Engine) {
    engine.set("a", "k", b"1").expect("set");
    engine.set("b", "k", b"2").expect("set");
    assert_eq!(engine.incr("a", "c").expect("incr"), 1);
    assert_eq!(engine.incr("b", "c").expect("incr"), 1);

    engine.delete("a", "k").expect("delete");
    assert_eq!(engine.get("a", "k").expect("get"), None);
    assert_eq!(engine.get("b", "k").expect("get"), Some(b"2".to_vec()));
}

/// `n` sequential increments return `1..=n`.
pub fn check_counter_sequence(engine: &dyn Engine, n: u64) {
    for expected in 1..=n {
        assert_eq!(
            engine.incr("d", "seq").expect("incr"),
            expected,
            "{}: counter skipped or repeated",
            engine.name()
        );
    }
}

/// A batch that fails part way leaves none of its writes behind, and a
/// batch that succeeds applies all of them.
pub fn check_atomic_batch(engine: &dyn Engine) {
    let result: Result<(), StorageError> = engine.multi(|tx| {
        tx.set("d", "a", b"1")?;
        tx.incr("d", "c")?;
        Err(StorageError::corrupted("abort after first write"))
    });
    assert!(result.is_err());
    assert_eq!(engine.get("d", "a").expect("get"), None, "{}: partial batch visible", engine.name());
    assert_eq!(engine.get("d", "c").expect("get"), None);

    engine
        .multi(|tx| {
            tx.set("d", "a", b"1")?;
            assert_eq!(tx.get("d", "a")?, Some(b"1".to_vec()), "read-your-writes");
            tx.set("d", "b", b"2")?;
            tx.delete("d", "a")?;
            Ok::<_, StorageError>(())
        })
        .expect("multi");
    assert_eq!(engine.get("d", "a").expect("get"), None);
    assert_eq!(engine.get("d", "b").expect("get"), Some(b"2".to_vec()));
}

/// A DAL error raised inside a batch rolls back its entity writes and is
/// returned unchanged.
pub fn check_dal_batch(engine: &dyn Engine) {
    let dal = Dal::new();
    let id = Uuid::from_u128(0xb10c);

    let result: Result<(), DalError> = engine.multi(|tx| {
        dal.set_segment(tx, "d", &Segment::new("d", id))?;
        dal.set_block(tx, "d", &Block::new("d", id, 0, b"data".to_vec()))?;
        Err(DalError::decode(seglog_dal::EntityKind::Log, "injected"))
    });
    assert!(matches!(result, Err(DalError::Decode { .. })));
    assert_eq!(dal.get_segment(engine, "d", &id).expect("get_segment"), None);
    assert_eq!(dal.get_block(engine, "d", &id, 0).expect("get_block"), None);

    engine
        .multi(|tx| {
            let mut log = Log::new("d", "events");
            log.head = Some(id);
            dal.set_segment(tx, "d", &Segment::new("d", id))?;
            dal.set_log(tx, "d", &log)?;
            Ok::<_, DalError>(())
        })
        .expect("multi");
    let log = dal.get_log(engine, "d", "events").expect("get_log").expect("present");
    assert_eq!(log.head, Some(id));
}

/// Applies `ops` one call at a time and compares against the model.
pub fn check_matches_model(engine: &dyn Engine, ops: &[KvOp]) {
    let mut model = Model::default();
    for op in ops {
        let expected = model.apply(op);
        let actual = apply_op(engine, op).expect("operation failed");
        assert_eq!(actual, expected, "{}: {op:?}", engine.name());
    }

    for (domain, key, value) in model.entries() {
        assert_eq!(
            engine.get(domain, key).expect("get").as_deref(),
            Some(value),
            "{}: {domain}/{key}",
            engine.name()
        );
    }
}

/// Concurrent increments from `threads` threads yield a permutation of
/// `1..=threads * per_thread`.
pub fn check_concurrent_incr<E>(engine: Arc<E>, threads: usize, per_thread: usize)
where
    E: Engine + ?Sized + 'static,
{
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                (0..per_thread)
                    .map(|_| engine.incr("d", "shared").expect("incr"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("incr thread panicked"))
        .collect();
    all.sort_unstable();

    let total = (threads * per_thread) as u64;
    assert_eq!(all, (1..=total).collect::<Vec<_>>(), "counter values not a permutation");
}

/// Runs every single-threaded check, each on its own fresh fixture.
pub fn run_all<F>(mut fresh: F)
where
    F: FnMut() -> TestEngine,
{
    check_end_to_end(&*fresh());
    check_absence(&*fresh());
    check_copy_isolation(&*fresh());
    check_domain_isolation(&*fresh());
    check_counter_sequence(&*fresh(), 50);
    check_atomic_batch(&*fresh());
    check_dal_batch(&*fresh());
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_storage::MemoryEngine;

    #[test]
    fn memory_engine_conforms() {
        run_all(TestEngine::memory);
    }

    #[test]
    fn memory_engine_concurrent_incr() {
        check_concurrent_incr(Arc::new(MemoryEngine::new()), 4, 25);
    }
}
