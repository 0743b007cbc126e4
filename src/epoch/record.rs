//! Per-thread participation record.

use std::cell::{Cell, UnsafeCell};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64};

use crate::queue::node::Node;
use crate::recycle::LocalCache;
use crate::stats::RecordCounters;

/// A node waiting for its retirement epoch to become safe.
pub(crate) struct Retired<T> {
    pub(crate) node: NonNull<Node<T>>,
    pub(crate) epoch: u64,
}

/// One thread's participation in one queue's epoch scheme.
///
/// `observed_epoch` and `active` are read by every scanning thread. Everything
/// else is private to the owning thread, except during teardown when the
/// manager has exclusive access.
#[repr(C, align(64))]
pub(crate) struct ThreadRecord<T> {
    /// Global epoch seen when the current guard was opened
    pub(crate) observed_epoch: AtomicU64,
    /// Set while the owner is inside a guard
    pub(crate) active: AtomicBool,
    /// Guard nesting depth (owner only)
    pub(crate) depth: Cell<usize>,
    /// Next record in the append-only list; fixed once published
    pub(crate) next: AtomicPtr<ThreadRecord<T>>,
    retired: UnsafeCell<Vec<Retired<T>>>,
    pub(crate) local_free: LocalCache<T>,
    pub(crate) counters: RecordCounters,
}

const _: () = assert!(
    std::mem::align_of::<ThreadRecord<()>>() == crate::constants::CACHE_LINE_BYTES
);

impl<T> ThreadRecord<T> {
    pub(crate) fn new() -> Self {
        Self {
            observed_epoch: AtomicU64::new(0),
            active: AtomicBool::new(false),
            depth: Cell::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
            retired: UnsafeCell::new(Vec::new()),
            local_free: LocalCache::new(),
            counters: RecordCounters::new(),
        }
    }

    /// Run `f` with the retired list.
    ///
    /// # Safety
    /// Only the owning thread (or a thread with exclusive access to the
    /// manager) may call this, and `f` must not re-enter the record.
    #[inline]
    pub(crate) unsafe fn with_retired<R>(&self, f: impl FnOnce(&mut Vec<Retired<T>>) -> R) -> R {
        f(&mut *self.retired.get())
    }

    /// Exclusive access to the retired list during teardown.
    pub(crate) fn retired_mut(&mut self) -> &mut Vec<Retired<T>> {
        self.retired.get_mut()
    }
}

// Safety: the shared fields are atomics; the owner-only fields are accessed
// through the unsafe accessors above under the single-owner contract.
unsafe impl<T: Send> Send for ThreadRecord<T> {}
unsafe impl<T: Send> Sync for ThreadRecord<T> {}
