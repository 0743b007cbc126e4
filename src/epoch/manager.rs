//! Epoch manager: participant list, guards, retirement and reclamation.

use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

use super::record::{Retired, ThreadRecord};
use super::registry;
use crate::queue::node::Node;
use crate::queue::QueueConfig;
use crate::recycle::Recycler;
use crate::stats::{QueueStats, RecordCounters};

/// Epochs a retired node must trail the global epoch by before reuse.
///
/// One epoch is not enough: a thread may have loaded the old value of the
/// global epoch just before an increment and published it right after.
const SAFE_EPOCH_LAG: u64 = 2;

/// Per-queue epoch-based reclamation state.
///
/// Tracks a global epoch, an append-only list of per-thread records and the
/// recycler that receives nodes once they are provably unreachable.
pub(crate) struct EpochManager<T> {
    /// Current global epoch
    global_epoch: CachePadded<AtomicU64>,
    /// Head of the append-only record list
    records: AtomicPtr<ThreadRecord<T>>,
    /// Number of records in the list
    participants: AtomicUsize,
    recycler: Recycler<T>,
    retire_threshold: usize,
    id: u64,
    /// Liveness token for thread-local slots
    alive: Arc<()>,
}

impl<T> EpochManager<T> {
    pub(crate) fn new(config: &QueueConfig) -> Self {
        Self {
            global_epoch: CachePadded::new(AtomicU64::new(0)),
            records: AtomicPtr::new(ptr::null_mut()),
            participants: AtomicUsize::new(0),
            recycler: Recycler::new(config.local_cache_limit),
            retire_threshold: config.retire_threshold,
            id: registry::next_manager_id(),
            alive: Arc::new(()),
        }
    }

    /// Current global epoch.
    #[inline]
    pub(crate) fn epoch(&self) -> u64 {
        self.global_epoch.load(Ordering::Acquire)
    }

    /// Number of threads that ever participated.
    pub(crate) fn participants(&self) -> usize {
        self.participants.load(Ordering::Relaxed)
    }

    pub(crate) fn retire_threshold(&self) -> usize {
        self.retire_threshold
    }

    pub(crate) fn local_cache_limit(&self) -> usize {
        self.recycler.local_cache_limit()
    }

    /// Enter a protected region for the calling thread.
    ///
    /// The outermost guard publishes the current global epoch and marks the
    /// record active; nested guards only bump the depth.
    #[inline]
    pub(crate) fn pin(&self) -> EpochGuard<'_, T> {
        let record = self.record();
        let depth = record.depth.get();
        record.depth.set(depth + 1);
        if depth == 0 {
            let epoch = self.global_epoch.load(Ordering::SeqCst);
            record.observed_epoch.store(epoch, Ordering::SeqCst);
            record.active.store(true, Ordering::SeqCst);
            // Order the publication before any later load of queue pointers.
            fence(Ordering::SeqCst);
        }
        EpochGuard {
            manager: self,
            record,
            _not_send: PhantomData,
        }
    }

    /// Return the calling thread's record, creating it on first use.
    fn record(&self) -> &ThreadRecord<T> {
        match registry::lookup(self.id) {
            // Safety: registered records live until `self` is dropped.
            Some(record) => unsafe { &*record.cast::<ThreadRecord<T>>().as_ptr() },
            None => self.register(),
        }
    }

    #[cold]
    fn register(&self) -> &ThreadRecord<T> {
        let record = Box::into_raw(Box::new(ThreadRecord::new()));
        // Safety: `Box::into_raw` never returns null.
        let record_ptr = unsafe { NonNull::new_unchecked(record) };

        let mut head = self.records.load(Ordering::Relaxed);
        loop {
            // Safety: not yet published, still exclusively ours.
            unsafe { record_ptr.as_ref().next.store(head, Ordering::Relaxed) };
            match self.records.compare_exchange_weak(
                head,
                record,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        let participants = self.participants.fetch_add(1, Ordering::Relaxed) + 1;
        let remembered = registry::register(self.id, Arc::downgrade(&self.alive), record_ptr.cast());
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                manager = self.id,
                participants,
                remembered,
                "registered epoch participant"
            );
        }

        // Safety: published records are only freed when `self` is dropped.
        unsafe { &*record }
    }

    /// Try to move the global epoch forward by one.
    ///
    /// Succeeds only if every active record has observed the current epoch.
    /// Best effort: a lagging thread simply postpones the advance to a later
    /// scan.
    fn try_advance(&self) -> bool {
        let current = self.global_epoch.load(Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let mut cursor = self.records.load(Ordering::Acquire);
        while let Some(record) = NonNull::new(cursor) {
            // Safety: records are never freed while the manager lives.
            let record = unsafe { record.as_ref() };
            if record.active.load(Ordering::SeqCst)
                && record.observed_epoch.load(Ordering::SeqCst) != current
            {
                return false;
            }
            cursor = record.next.load(Ordering::Acquire);
        }

        self.global_epoch
            .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// Advance the epoch if possible, then recycle the caller's retired nodes
    /// that are old enough.
    fn scan(&self, record: &ThreadRecord<T>) {
        if self.try_advance() {
            RecordCounters::add(&record.counters.epoch_advances, 1);
        }

        let current = self.global_epoch.load(Ordering::SeqCst);
        // Entries tagged `current - 2` or older are safe. Written as an
        // addition so that nothing is released before the epoch has moved
        // twice (at epochs 0 and 1 there is no safe epoch yet).
        let safe_epoch = current.checked_sub(SAFE_EPOCH_LAG);

        // Safety: called from a guard of the owning thread.
        let ready = unsafe {
            record.with_retired(|retired| {
                let mut ready = Vec::new();
                retired.retain(|entry| {
                    if entry.epoch + SAFE_EPOCH_LAG <= current {
                        ready.push(entry.node);
                        false
                    } else {
                        true
                    }
                });
                ready
            })
        };

        if ready.is_empty() {
            return;
        }
        let reclaimed = ready.len();
        for node in ready {
            // Safety: the node is unreachable from the chain and from every
            // active guard, and the retired list handed us its ownership.
            unsafe {
                self.recycler
                    .reclaim(&record.local_free, &record.counters, node)
            };
        }
        RecordCounters::add(&record.counters.reclaimed, reclaimed as u64);

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(epoch = current, ?safe_epoch, reclaimed, "reclaimed retired nodes");
        }
    }

    /// Snapshot the counters of every record.
    pub(crate) fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            epoch: self.epoch(),
            participants: self.participants(),
            ..QueueStats::default()
        };
        let mut cursor = self.records.load(Ordering::Acquire);
        while let Some(record) = NonNull::new(cursor) {
            // Safety: records are never freed while the manager lives.
            let record = unsafe { record.as_ref() };
            record.counters.accumulate_into(&mut stats);
            cursor = record.next.load(Ordering::Acquire);
        }
        stats
    }
}

impl<T> Drop for EpochManager<T> {
    fn drop(&mut self) {
        let mut released_retired = 0usize;
        let mut released_pooled = 0usize;

        let mut cursor = *self.records.get_mut();
        while !cursor.is_null() {
            // Safety: every record was created by `Box::into_raw` in
            // `register`, and `&mut self` rules out concurrent operations.
            let mut record = unsafe { Box::from_raw(cursor) };
            cursor = *record.next.get_mut();

            for Retired { node, .. } in record.retired_mut().drain(..) {
                // Safety: retired nodes are unreachable from the chain.
                unsafe { Node::dealloc(node) };
                released_retired += 1;
            }
            // Safety: exclusive access during teardown.
            released_pooled += unsafe { record.local_free.with(|list| list.release_all()) };
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                manager = self.id,
                released_retired,
                released_pooled,
                "epoch manager torn down"
            );
        }
    }
}

/// RAII guard for one protected queue operation.
///
/// Bound to the thread that created it.
pub(crate) struct EpochGuard<'a, T> {
    manager: &'a EpochManager<T>,
    record: &'a ThreadRecord<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T> EpochGuard<'_, T> {
    /// Get an empty node from the recycler, or `None` if allocation failed.
    #[inline]
    pub(crate) fn acquire_node(&self) -> Option<NonNull<Node<T>>> {
        // Safety: the guard proves we are on the record's owning thread.
        unsafe {
            self.manager
                .recycler
                .acquire(&self.record.local_free, &self.record.counters)
        }
    }

    /// Hand a node that was just unlinked from the chain to the manager.
    ///
    /// # Safety
    /// `node` must no longer be reachable from the queue's `head`, and the
    /// caller must be the unique thread that unlinked it.
    pub(crate) unsafe fn retire(&self, node: NonNull<Node<T>>) {
        let epoch = self.manager.global_epoch.load(Ordering::SeqCst);
        let pending = self.record.with_retired(|retired| {
            retired.push(Retired { node, epoch });
            retired.len()
        });
        RecordCounters::add(&self.record.counters.retired, 1);

        if pending >= self.manager.retire_threshold {
            self.manager.scan(self.record);
        }
    }
}

impl<T> Drop for EpochGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        let depth = self.record.depth.get() - 1;
        self.record.depth.set(depth);
        if depth == 0 {
            self.record.active.store(false, Ordering::Release);
        }
    }
}
