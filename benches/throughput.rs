//! Throughput Benchmark for linekv
//!
//! Measures the storage engine and the request path under a few
//! workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use linekv::commands::CommandHandler;
use linekv::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            engine.set(&key, "small_value").unwrap();
            i += 1;
        });
    });

    group.bench_function("set_max_value", |b| {
        let mut i = 0u64;
        let value = "x".repeat(128);
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            engine.set(&key, &value).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        engine
            .set(&format!("key:{}", i), &format!("value:{}", i))
            .unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark hash operations
fn bench_hash(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("hash");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hset_hget", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("user:{}", i % 1000);
            let field = format!("f{}", i % 64);
            engine.hset(&key, &field, "value").unwrap();
            black_box(engine.hget(&key, &field));
            i += 1;
        });
    });

    // Single counter (high contention on one bucket)
    group.bench_function("hincrby_single_counter", |b| {
        b.iter(|| {
            black_box(engine.hincrby("counters", "hits", 1.0).unwrap());
        });
    });

    group.finish();
}

/// Benchmark the full parse + dispatch path
fn bench_requests(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));

    let mut group = c.benchmark_group("requests");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_then_get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = i % 10_000;
            black_box(handler.execute(&format!("SET k{} \"some value\"", key)));
            black_box(handler.execute(&format!("GET k{}", key)).serialize());
            i += 1;
        });
    });

    group.bench_function("mget_4", |b| {
        handler.execute("MSET a 1 b 2 c 3 d 4");
        b.iter(|| {
            black_box(handler.execute("MGET a b c d").serialize());
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            engine.set(&key, "value").unwrap();
                            engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.count_keys());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_hash,
    bench_requests,
    bench_concurrent,
);

criterion_main!(benches);
