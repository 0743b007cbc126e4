//! Token bucket with a background refill thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Shared {
    /// Token count as `f64` bits
    tokens: AtomicU64,
    capacity: f64,
    stopped: AtomicBool,
}

impl Shared {
    fn tokens(&self) -> f64 {
        f64::from_bits(self.tokens.load(Ordering::Acquire))
    }

    fn refill(&self, amount: f64) {
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            let tokens = f64::from_bits(current);
            if tokens >= self.capacity {
                return;
            }
            let next = (tokens + amount).min(self.capacity);
            match self.tokens.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// A token bucket refilled at a fixed rate by a dedicated thread.
///
/// The bucket starts empty. Every `interval` the refill thread adds
/// `rate * interval` tokens, saturating at the capacity.
pub struct TokenBucket {
    shared: Arc<Shared>,
    rate: f64,
    interval: Duration,
    refill: Mutex<Option<JoinHandle<()>>>,
}

impl TokenBucket {
    /// Create a bucket and start its refill thread.
    ///
    /// `rate` is in tokens per second.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not positive, `rate` is negative, either is
    /// not finite, or `interval` is zero.
    pub fn new(capacity: f64, rate: f64, interval: Duration) -> Self {
        assert!(
            capacity.is_finite() && capacity > 0.0,
            "token bucket capacity must be positive"
        );
        assert!(
            rate.is_finite() && rate >= 0.0,
            "token bucket rate must be non-negative"
        );
        assert!(!interval.is_zero(), "refill interval must be non-zero");

        let shared = Arc::new(Shared {
            tokens: AtomicU64::new(0f64.to_bits()),
            capacity,
            stopped: AtomicBool::new(false),
        });
        let per_tick = rate * interval.as_secs_f64();
        let worker = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || refill_loop(shared, per_tick, interval))
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(capacity, rate, ?interval, "token bucket refill started");
        }

        Self {
            shared,
            rate,
            interval,
            refill: Mutex::new(Some(worker)),
        }
    }

    /// Tokens currently available.
    pub fn tokens(&self) -> f64 {
        self.shared.tokens()
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> f64 {
        self.shared.capacity
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Time between refills.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the refill thread is still running.
    pub fn is_running(&self) -> bool {
        !self.shared.stopped.load(Ordering::Acquire)
    }

    /// Take `n` tokens if that many are available.
    pub fn consume(&self, n: f64) -> bool {
        if n.is_nan() || n <= 0.0 {
            return false;
        }
        let mut current = self.shared.tokens.load(Ordering::Acquire);
        loop {
            let tokens = f64::from_bits(current);
            if tokens < n {
                return false;
            }
            match self.shared.tokens.compare_exchange_weak(
                current,
                (tokens - n).to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Stop refilling and join the refill thread.
    ///
    /// Returns `false` if the bucket was already stopped. Tokens already in
    /// the bucket stay consumable.
    pub fn stop(&self) -> bool {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Some(worker) = self.refill.lock().take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(tokens = self.tokens(), "token bucket refill stopped");
        }
        true
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("tokens", &self.tokens())
            .field("capacity", &self.capacity())
            .field("rate", &self.rate)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn refill_loop(shared: Arc<Shared>, per_tick: f64, interval: Duration) {
    while !shared.stopped.load(Ordering::Acquire) {
        shared.refill(per_tick);

        // park_timeout may wake early; sleep out the rest of the tick.
        let deadline = Instant::now() + interval;
        loop {
            if shared.stopped.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
