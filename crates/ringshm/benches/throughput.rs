use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ringshm_rs::{LocalMpmc, LocalMpsc, LocalSpsc};
use std::sync::Arc;
use std::thread;

const BATCH: u64 = 10_000;

fn bench_spsc_ping_pong(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.throughput(Throughput::Elements(BATCH));

    group.bench_function("push_pop_same_thread", |b| {
        let ring = LocalSpsc::<u64>::new(1024).unwrap();
        b.iter(|| {
            for i in 0..BATCH {
                ring.try_push(i).unwrap();
                std::hint::black_box(ring.try_pop().unwrap());
            }
        });
    });

    group.bench_function("cross_thread", |b| {
        b.iter_custom(|iters| {
            let ring = Arc::new(LocalSpsc::<u64>::new(1024).unwrap());
            let total = iters * BATCH;

            let consumer = {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for _ in 0..total {
                        while ring.try_pop().is_err() {
                            std::hint::spin_loop();
                        }
                    }
                })
            };

            let start = std::time::Instant::now();
            for i in 0..total {
                while ring.try_push(i).is_err() {
                    std::hint::spin_loop();
                }
            }
            consumer.join().unwrap();
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_contended_producers(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");

    for producers in [2u64, 4] {
        group.throughput(Throughput::Elements(BATCH * producers));
        group.bench_with_input(
            BenchmarkId::new("mpsc_producers", producers),
            &producers,
            |b, &producers| {
                b.iter_custom(|iters| {
                    let ring = Arc::new(LocalMpsc::<u64>::new(1024).unwrap());
                    let per_producer = iters * BATCH;

                    let start = std::time::Instant::now();
                    let mut handles = Vec::new();
                    for _ in 0..producers {
                        let ring = Arc::clone(&ring);
                        handles.push(thread::spawn(move || {
                            for i in 0..per_producer {
                                while ring.try_push(i).is_err() {
                                    std::hint::spin_loop();
                                }
                            }
                        }));
                    }

                    let total = per_producer * producers;
                    for _ in 0..total {
                        while ring.try_pop().is_err() {
                            std::hint::spin_loop();
                        }
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn bench_mpmc_symmetric(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc");
    group.throughput(Throughput::Elements(BATCH * 2));

    group.bench_function("2p2c", |b| {
        b.iter_custom(|iters| {
            let ring = Arc::new(LocalMpmc::<u64>::new(1024).unwrap());
            let per_side = iters * BATCH;

            let start = std::time::Instant::now();
            let mut handles = Vec::new();
            for _ in 0..2 {
                let ring = Arc::clone(&ring);
                handles.push(thread::spawn(move || {
                    for i in 0..per_side {
                        while ring.try_push(i).is_err() {
                            std::hint::spin_loop();
                        }
                    }
                }));
            }
            for _ in 0..2 {
                let ring = Arc::clone(&ring);
                handles.push(thread::spawn(move || {
                    for _ in 0..per_side {
                        while ring.try_pop().is_err() {
                            std::hint::spin_loop();
                        }
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_spsc_ping_pong,
    bench_contended_producers,
    bench_mpmc_symmetric
);
criterion_main!(benches);
