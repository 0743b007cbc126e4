//! Bounded ring versus the unbounded queue under producer/consumer load.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, SamplingMode,
    Throughput,
};

use atomkit::primitives::RingBuffer;
use atomkit::Queue;

const RING_SLOTS: usize = 1 << 12;
const OPS_PER_PRODUCER: usize = 32 * 1024;

/// Half the workers produce, half consume, until every value went through.
///
/// Consumers spin on producers, so each side gets a dedicated OS thread
/// rather than a pool task.
fn run_pairs<P, C>(workers: usize, produce: P, consume: C)
where
    P: Fn(usize) + Sync,
    C: Fn() -> bool + Sync,
{
    let producers = workers / 2;
    let total = producers * OPS_PER_PRODUCER;
    let consumed = AtomicUsize::new(0);

    thread::scope(|s| {
        for w in 0..workers {
            let (produce, consume, consumed) = (&produce, &consume, &consumed);
            s.spawn(move || {
                if w < producers {
                    for i in 0..OPS_PER_PRODUCER {
                        produce(w * OPS_PER_PRODUCER + i);
                    }
                } else {
                    while consumed.load(Ordering::Relaxed) < total {
                        if consume() {
                            consumed.fetch_add(1, Ordering::Relaxed);
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                }
            });
        }
    });
}

fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc/producer_consumer");
    group.sampling_mode(SamplingMode::Flat);
    group.measurement_time(Duration::from_secs(8));
    group.sample_size(20);

    for workers in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(((workers / 2) * OPS_PER_PRODUCER) as u64));

        group.bench_function(BenchmarkId::new("ring", workers), |b| {
            b.iter_batched(
                || Arc::new(RingBuffer::<usize, RING_SLOTS>::new()),
                |ring| {
                    run_pairs(
                        workers,
                        |value| {
                            let mut value = value;
                            while let Err(back) = ring.try_enqueue(value) {
                                value = back;
                                std::hint::spin_loop();
                            }
                        },
                        || black_box(ring.pop()).is_some(),
                    )
                },
                BatchSize::LargeInput,
            )
        });

        group.bench_function(BenchmarkId::new("queue", workers), |b| {
            b.iter_batched(
                || Arc::new(Queue::new()),
                |queue| {
                    run_pairs(
                        workers,
                        |value| queue.enqueue(value),
                        || black_box(queue.pop()).is_some(),
                    )
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mpmc);
criterion_main!(benches);
