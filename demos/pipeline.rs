//! A small job pipeline built from atomkit pieces.
//!
//! Producers push jobs into a shared [`Queue`]; workers drain it, throttled
//! by a [`TokenBucket`], memoise results in an [`LfuCache`] and report
//! progress through a [`RateLimiter`] so the console is not flooded.
//!
//! Run with:
//! ```bash
//! cargo run --example pipeline
//! ATOMKIT__queue__retire_threshold=16 cargo run --example pipeline
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use atomkit::prelude::*;

const PRODUCERS: u64 = 2;
const WORKERS: usize = 3;
const JOBS_PER_PRODUCER: u64 = 2_000;

#[derive(Debug, Clone, Copy)]
struct Job {
    id: u64,
    input: u64,
}

fn collatz_steps(mut n: u64) -> u64 {
    let mut steps = 0;
    while n > 1 {
        n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
        steps += 1;
    }
    steps
}

fn main() -> Result<(), ConfigError> {
    let config = AtomkitConfig::load_from_env()?.to_queue_config()?;
    let queue = Arc::new(Queue::with_config(config)?);
    let budget = Arc::new(TokenBucket::new(500.0, 50_000.0, Duration::from_millis(5)));
    let cache = Arc::new(LfuCache::new(256));
    let progress = Arc::new(RateLimiter::new(Duration::from_millis(200), 1));
    let longest = Arc::new(MinMax::new(0u64));
    let done = Arc::new(AtomicU64::new(0));
    let total = PRODUCERS * JOBS_PER_PRODUCER;
    let started = Instant::now();

    println!("queue config: {config:?}");

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..JOBS_PER_PRODUCER {
                    let id = p * JOBS_PER_PRODUCER + i;
                    // Small input space so the cache gets hits.
                    queue.enqueue(Job {
                        id,
                        input: 1 + (id * 7919) % 1500,
                    });
                }
            })
        })
        .collect();

    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let queue = Arc::clone(&queue);
            let budget = Arc::clone(&budget);
            let cache = Arc::clone(&cache);
            let progress = Arc::clone(&progress);
            let longest = Arc::clone(&longest);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut hits = 0u64;
                while done.load(Ordering::Relaxed) < total {
                    let Some(job) = queue.pop() else {
                        thread::yield_now();
                        continue;
                    };
                    while !budget.consume(1.0) {
                        thread::yield_now();
                    }

                    let steps = match cache.get(&job.input) {
                        Some(steps) => {
                            hits += 1;
                            steps
                        }
                        None => {
                            let steps = collatz_steps(job.input);
                            cache.put(job.input, steps);
                            steps
                        }
                    };
                    longest.update_max(steps);

                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if progress.allow() {
                        println!(
                            "worker {w}: job {} done, {finished}/{total} complete",
                            job.id
                        );
                    }
                }
                hits
            })
        })
        .collect();

    for handle in producers {
        handle.join().expect("producer panicked");
    }
    let hits: u64 = workers
        .into_iter()
        .map(|handle| handle.join().expect("worker panicked"))
        .sum();
    budget.stop();

    println!(
        "processed {total} jobs in {:?}; cache hits {hits}; longest chain {} steps",
        started.elapsed(),
        longest.load()
    );
    println!("queue stats: {}", queue.stats());
    Ok(())
}
