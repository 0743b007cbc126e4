//! Recycling and reclamation statistics.
//!
//! Counters live in each participant record and are written only by the
//! owning thread, so updates are plain relaxed load/store pairs rather than
//! contended read-modify-write operations. A [`QueueStats`] snapshot sums them
//! across records.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-record counters, written by the owning thread only.
#[derive(Debug, Default)]
pub(crate) struct RecordCounters {
    pub(crate) fresh_allocations: AtomicU64,
    pub(crate) local_reuses: AtomicU64,
    pub(crate) global_reuses: AtomicU64,
    pub(crate) retired: AtomicU64,
    pub(crate) reclaimed: AtomicU64,
    pub(crate) spilled: AtomicU64,
    pub(crate) epoch_advances: AtomicU64,
}

impl RecordCounters {
    pub(crate) const fn new() -> Self {
        Self {
            fresh_allocations: AtomicU64::new(0),
            local_reuses: AtomicU64::new(0),
            global_reuses: AtomicU64::new(0),
            retired: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
            spilled: AtomicU64::new(0),
            epoch_advances: AtomicU64::new(0),
        }
    }

    /// Single-writer increment.
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.store(counter.load(Ordering::Relaxed) + n, Ordering::Relaxed);
    }

    pub(crate) fn accumulate_into(&self, stats: &mut QueueStats) {
        stats.fresh_allocations += self.fresh_allocations.load(Ordering::Relaxed);
        stats.local_reuses += self.local_reuses.load(Ordering::Relaxed);
        stats.global_reuses += self.global_reuses.load(Ordering::Relaxed);
        stats.retired += self.retired.load(Ordering::Relaxed);
        stats.reclaimed += self.reclaimed.load(Ordering::Relaxed);
        stats.spilled += self.spilled.load(Ordering::Relaxed);
        stats.epoch_advances += self.epoch_advances.load(Ordering::Relaxed);
    }
}

/// Point-in-time view of a queue's memory management.
///
/// Approximate while operations are in flight, exact once the queue is
/// quiescent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Current global epoch.
    pub epoch: u64,
    /// Number of participant records (threads that touched the queue).
    pub participants: usize,
    /// Nodes obtained from the global allocator.
    pub fresh_allocations: u64,
    /// Nodes reused from a thread-local free list.
    pub local_reuses: u64,
    /// Nodes pulled from the global free stack.
    pub global_reuses: u64,
    /// Nodes handed to the reclamation manager.
    pub retired: u64,
    /// Retired nodes returned to the recycler.
    pub reclaimed: u64,
    /// Nodes moved from a local free list to the global free stack.
    pub spilled: u64,
    /// Successful epoch advances.
    pub epoch_advances: u64,
}

impl QueueStats {
    /// Retired nodes still waiting for a safe epoch.
    pub fn pending_retired(&self) -> u64 {
        self.retired.saturating_sub(self.reclaimed)
    }

    /// Fraction of node acquisitions served by the recycler.
    pub fn reuse_ratio(&self) -> f64 {
        let reused = self.local_reuses + self.global_reuses;
        let total = reused + self.fresh_allocations;
        if total == 0 {
            return 0.0;
        }
        reused as f64 / total as f64
    }
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch={} participants={} fresh={} reused={} retired={} reclaimed={} pending={}",
            self.epoch,
            self.participants,
            self.fresh_allocations,
            self.local_reuses + self.global_reuses,
            self.retired,
            self.reclaimed,
            self.pending_retired()
        )
    }
}
