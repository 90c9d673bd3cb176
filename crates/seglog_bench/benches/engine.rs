//! Storage engine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog_storage::{Engine, EngineExt, FileEngine, MemoryEngine, StorageError, Tx};
use tempfile::TempDir;

/// Create deterministic data of given size.
fn test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Opens a file engine in a fresh temp directory.
///
/// Commits skip fsync so the numbers measure the engine, not the disk.
fn file_engine() -> (TempDir, FileEngine) {
    let dir = TempDir::new().unwrap();
    let engine = FileEngine::new(dir.path().join("bench.seglog")).with_sync(false);
    (dir, engine)
}

fn bench_incr(c: &mut Criterion) {
    let mut group = c.benchmark_group("incr");

    group.bench_function("memory", |b| {
        let engine = MemoryEngine::new();
        b.iter(|| black_box(engine.incr("bench", "counter").unwrap()));
    });

    group.bench_function("file", |b| {
        let (_dir, engine) = file_engine();
        b.iter(|| black_box(engine.incr("bench", "counter").unwrap()));
    });

    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");

    for size in [64, 1024, 16 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let engine = MemoryEngine::new();
            let data = test_data(size);
            b.iter(|| engine.set("bench", "key", black_box(&data)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("file", size), size, |b, &size| {
            let (_dir, engine) = file_engine();
            let data = test_data(size);
            b.iter(|| engine.set("bench", "key", black_box(&data)).unwrap());
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for keys in [100, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("memory", keys), keys, |b, &keys| {
            let engine = MemoryEngine::new();
            fill(&engine, keys);
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % keys;
                black_box(engine.get("bench", &format!("key.{i}")).unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("file", keys), keys, |b, &keys| {
            let (_dir, engine) = file_engine();
            fill(&engine, keys);
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % keys;
                black_box(engine.get("bench", &format!("key.{i}")).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_multi_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_batch");

    for batch in [10, 100].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("file", batch), batch, |b, &batch| {
            let (_dir, engine) = file_engine();
            let data = test_data(128);
            b.iter(|| {
                engine
                    .multi(|tx| {
                        for i in 0..batch {
                            tx.set("bench", &format!("key.{i}"), &data)?;
                        }
                        Ok::<_, StorageError>(())
                    })
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    group.sample_size(10);

    group.bench_function("file_1000_keys", |b| {
        let (_dir, engine) = file_engine();
        fill(&engine, 1000);
        b.iter(|| black_box(engine.compact().unwrap()));
    });

    group.finish();
}

fn fill(engine: &dyn Engine, keys: usize) {
    let data = test_data(64);
    engine
        .multi(|tx| {
            for i in 0..keys {
                tx.set("bench", &format!("key.{i}"), &data)?;
            }
            Ok::<_, StorageError>(())
        })
        .unwrap();
}

criterion_group!(
    benches,
    bench_incr,
    bench_set,
    bench_get,
    bench_multi_batch,
    bench_compact
);
criterion_main!(benches);
