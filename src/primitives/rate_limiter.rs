//! Fixed-window rate limiter.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Admits at most `limit` calls per `window`.
///
/// The first call after a window expires opens a new window and counts as
/// its first admission. Admission is approximate around the window switch:
/// a call racing the reset may be counted against either window.
#[derive(Debug)]
pub struct RateLimiter {
    count: AtomicU32,
    /// Window start, in nanoseconds since `origin`
    window_start: AtomicU64,
    window_nanos: u64,
    limit: u32,
    origin: Instant,
}

impl RateLimiter {
    /// Create a limiter; the first window starts now.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            window_start: AtomicU64::new(0),
            window_nanos: u64::try_from(window.as_nanos()).unwrap_or(u64::MAX),
            limit,
            origin: Instant::now(),
        }
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_nanos(self.window_nanos)
    }

    /// Maximum admissions per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Try to admit one call.
    pub fn allow(&self) -> bool {
        if self.limit == 0 {
            return false;
        }
        loop {
            let now = self.now_nanos();
            let start = self.window_start.load(Ordering::Acquire);

            if now.saturating_sub(start) >= self.window_nanos {
                if self
                    .window_start
                    .compare_exchange_weak(start, now, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.count.store(1, Ordering::Release);
                    return true;
                }
                std::hint::spin_loop();
                continue;
            }

            let mut count = self.count.load(Ordering::Acquire);
            loop {
                if count >= self.limit {
                    if self.window_start.load(Ordering::Acquire) == start {
                        return false;
                    }
                    // A new window opened meanwhile.
                    break;
                }
                match self.count.compare_exchange_weak(
                    count,
                    count + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(actual) => count = actual,
                }
            }
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
