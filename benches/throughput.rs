//! Throughput Benchmark for binttl
//!
//! Measures the client operations against the in-memory store.

use binttl::config::ScanPolicy;
use binttl::store::Key;
use binttl::{ExpireBin, ExpireBinModule, ManualClock, MemoryStore, PutSpec, TouchSpec};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

const NS: &str = "bench";
const SET: &str = "expireBin";

fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, ExpireBin) {
    let clock = Arc::new(ManualClock::new(1_000));
    let store = Arc::new(MemoryStore::new());
    store
        .register(Arc::new(ExpireBinModule::new(clock.clone())))
        .unwrap();
    let client = ExpireBin::new(store.clone());
    (store, clock, client)
}

/// Benchmark single-bin puts
fn bench_put(c: &mut Criterion) {
    let (_store, _clock, client) = setup();

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i));
            client.put(&key, "bin", "small_value", 60, true).unwrap();
            i += 1;
        });
    });

    group.bench_function("put_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i));
            client.put(&key, "bin", value.as_str(), 60, true).unwrap();
            i += 1;
        });
    });

    group.bench_function("put_overwrite", |b| {
        let key = Key::new(NS, SET, "hot");
        let mut i = 0i64;
        b.iter(|| {
            client.put(&key, "bin", i, 60, true).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark reads
fn bench_get(c: &mut Criterion) {
    let (_store, _clock, client) = setup();

    for i in 0..10_000 {
        let key = Key::new(NS, SET, format!("key:{}", i));
        client
            .puts(
                &key,
                &[
                    PutSpec::expiring("a", format!("value:{}", i), 60),
                    PutSpec::expiring("b", i as i64, -1),
                ],
            )
            .unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_one", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i % 10_000));
            black_box(client.get(&key, &["a"]).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_two", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i % 10_000));
            black_box(client.get(&key, &["a", "b"]).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("missing:{}", i));
            black_box(client.get(&key, &["a"]).unwrap());
            i += 1;
        });
    });

    group.bench_function("ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i % 10_000));
            black_box(client.ttl(&key, "a").unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark batch writes
fn bench_batch(c: &mut Criterion) {
    let (_store, _clock, client) = setup();

    // touch needs every bin to exist already
    for i in 0..1_000 {
        let key = Key::new(NS, SET, format!("key:{}", i));
        for n in 0..8 {
            client.put(&key, &format!("bin{}", n), n as i64, 60, true).unwrap();
        }
    }

    let mut group = c.benchmark_group("batch");

    group.throughput(Throughput::Elements(8));
    group.bench_function("puts_8", |b| {
        let specs: Vec<PutSpec> = (0..8)
            .map(|n| PutSpec::expiring(format!("bin{}", n), n as i64, 60))
            .collect();
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i % 1_000));
            client.puts(&key, &specs).unwrap();
            i += 1;
        });
    });

    group.bench_function("touch_8", |b| {
        let specs: Vec<TouchSpec> = (0..8)
            .map(|n| TouchSpec::new(format!("bin{}", n), 120))
            .collect();
        let mut i = 0u64;
        b.iter(|| {
            let key = Key::new(NS, SET, format!("key:{}", i % 1_000));
            client.touch(&key, &specs).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("4_threads_mixed", |b| {
        let (_store, _clock, client) = setup();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let client = client.clone();
                    thread::spawn(move || {
                        for i in 0..1000 {
                            let key = Key::new(NS, SET, format!("t{}:key:{}", t, i % 100));
                            if i % 4 == 0 {
                                client.put(&key, "bin", i as i64, 60, true).unwrap();
                            } else {
                                black_box(client.get(&key, &["bin"]).unwrap());
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

/// Benchmark sweeps
fn bench_clean(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean");
    group.sample_size(20);

    group.bench_function("clean_1000_records_half_expired", |b| {
        b.iter_with_setup(
            || {
                let (store, clock, client) = setup();
                for i in 0..1000 {
                    let key = Key::new(NS, SET, format!("key:{}", i));
                    let ttl = if i % 2 == 0 { 1 } else { -1 };
                    client.put(&key, "bin", i as i64, ttl, true).unwrap();
                }
                clock.advance(10);
                (store, client)
            },
            |(_store, client)| {
                let report = client
                    .clean(&ScanPolicy::default(), NS, SET, &["bin"])
                    .unwrap();
                black_box(report.bins_purged);
            },
        );
    });

    group.bench_function("clean_1000_records_nothing_expired", |b| {
        let (_store, _clock, client) = setup();
        for i in 0..1000 {
            let key = Key::new(NS, SET, format!("key:{}", i));
            client.put(&key, "bin", i as i64, -1, true).unwrap();
        }

        b.iter(|| {
            let report = client
                .clean(&ScanPolicy::default(), NS, SET, &["bin"])
                .unwrap();
            black_box(report.records_scanned);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_batch,
    bench_concurrent,
    bench_clean,
);

criterion_main!(benches);
