//! Submit throughput benchmark
//!
//! Benchmarks the hot path: submit → idle worker handoff → revert.
//! Compares idle store layouts and handoff modes under contention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use spindle::{Pool, PoolOptions, StoreKind};

/// Spin until `target` tasks have completed
fn drain(completed: &AtomicU64, target: u64) {
    while completed.load(Ordering::Acquire) < target {
        thread::yield_now();
    }
}

/// Benchmark single-submitter throughput (baseline)
fn bench_submit_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit/single");
    group.throughput(Throughput::Elements(1));

    for store in [StoreKind::Stack, StoreKind::Ring] {
        group.bench_with_input(
            BenchmarkId::new("store", store),
            &store,
            |b, &store| {
                let options = PoolOptions::default()
                    .with_store(store)
                    .with_expiry_duration(Duration::from_secs(60));
                let pool = Pool::new(8, options).unwrap();

                b.iter_custom(|iters| {
                    let completed = Arc::new(AtomicU64::new(0));
                    let start = Instant::now();
                    for _ in 0..iters {
                        let completed = completed.clone();
                        pool.submit(move || {
                            completed.fetch_add(1, Ordering::Release);
                        })
                        .unwrap();
                    }
                    drain(&completed, iters);
                    start.elapsed()
                });

                pool.release();
            },
        );
    }

    group.finish();
}

/// Benchmark rendezvous vs single-slot inbox handoff
fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit/handoff");
    group.throughput(Throughput::Elements(1));

    for slots in [0usize, 1] {
        group.bench_with_input(BenchmarkId::new("slots", slots), &slots, |b, &slots| {
            let options = PoolOptions::default().with_handoff_capacity(slots);
            let pool = Pool::new(4, options).unwrap();

            b.iter_custom(|iters| {
                let completed = Arc::new(AtomicU64::new(0));
                let start = Instant::now();
                for _ in 0..iters {
                    let completed = completed.clone();
                    pool.submit(move || {
                        completed.fetch_add(1, Ordering::Release);
                    })
                    .unwrap();
                }
                drain(&completed, iters);
                start.elapsed()
            });

            pool.release();
        });
    }

    group.finish();
}

/// Benchmark concurrent submitters contending for a small pool
fn bench_submit_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit/concurrent");
    group.sample_size(20);

    for submitters in [2u64, 4, 8] {
        let task_count = 5000u64;
        group.throughput(Throughput::Elements(task_count));
        group.bench_with_input(
            BenchmarkId::new("submitters", submitters),
            &submitters,
            |b, &submitters| {
                let pool = Pool::with_capacity(4).unwrap();

                b.iter(|| {
                    let completed = Arc::new(AtomicU64::new(0));
                    let per_submitter = task_count / submitters;

                    let handles: Vec<_> = (0..submitters)
                        .map(|_| {
                            let pool = pool.clone();
                            let completed = completed.clone();
                            thread::spawn(move || {
                                for _ in 0..per_submitter {
                                    let completed = completed.clone();
                                    pool.submit(move || {
                                        completed.fetch_add(1, Ordering::Release);
                                    })
                                    .unwrap();
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                    drain(&completed, per_submitter * submitters);
                });

                pool.release();
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_single,
    bench_handoff,
    bench_submit_concurrent
);
criterion_main!(benches);
