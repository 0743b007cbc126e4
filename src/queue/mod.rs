//! Unbounded lock-free MPMC FIFO queue
//!
//! A Michael-Scott linked-list queue. `head` always points at a sentinel
//! node whose value has already been consumed; the elements live in the nodes
//! after it. `tail` may lag behind the last node and is pushed forward by
//! whichever thread notices.
//!
//! Nodes unlinked by a dequeue are retired to the queue's epoch manager and
//! recycled once no guard can still see them, so steady-state traffic does
//! not touch the allocator.

mod config;
mod error;
pub(crate) mod node;

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam::utils::CachePadded;

use crate::config::ConfigError;
use crate::epoch::{EpochGuard, EpochManager};
use crate::stats::QueueStats;
use node::Node;

pub use config::{QueueConfig, DEFAULT_LOCAL_CACHE_LIMIT, DEFAULT_RETIRE_THRESHOLD};
pub use error::AllocError;

/// Unbounded lock-free multi-producer multi-consumer queue.
///
/// Operations never block: `enqueue` always succeeds (short of running out
/// of memory) and `try_dequeue` reports an empty queue instead of waiting.
/// Both are lock-free but not wait-free.
///
/// ```
/// use atomkit::Queue;
///
/// let queue = Queue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
///
/// let mut out = 0;
/// assert!(queue.try_dequeue(&mut out));
/// assert_eq!(out, 1);
/// assert_eq!(queue.pop(), Some(2));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct Queue<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    epoch: EpochManager<T>,
    _marker: PhantomData<*mut T>,
}

// Safety: values are moved between threads but never shared; all shared
// state is reached through atomics and epoch-protected pointers.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Queue<T> {
    /// Create an empty queue with default tuning.
    pub fn new() -> Self {
        Self::build(&QueueConfig::default())
    }

    /// Create an empty queue with custom tuning.
    pub fn with_config(config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(&config))
    }

    fn build(config: &QueueConfig) -> Self {
        let sentinel = Node::<T>::alloc_sentinel().as_ptr();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            epoch: EpochManager::new(config),
            _marker: PhantomData,
        }
    }

    /// The tuning this queue was built with.
    pub fn config(&self) -> QueueConfig {
        QueueConfig {
            retire_threshold: self.epoch.retire_threshold(),
            local_cache_limit: self.epoch.local_cache_limit(),
        }
    }

    /// Append `value` at the tail.
    ///
    /// Only fails if no node can be allocated, in which case the process
    /// aborts through [`std::alloc::handle_alloc_error`].
    pub fn enqueue(&self, value: T) {
        if let Err(err) = self.try_enqueue(value) {
            std::alloc::handle_alloc_error(err.layout());
        }
    }

    /// Append `value` at the tail, handing it back if no node can be
    /// allocated.
    ///
    /// On error the queue is left untouched.
    pub fn try_enqueue(&self, value: T) -> Result<(), AllocError<T>> {
        let guard = self.epoch.pin();
        let Some(node) = guard.acquire_node() else {
            drop(guard);
            return Err(AllocError::new(value, Node::<T>::LAYOUT));
        };
        // Safety: the node is fresh from the recycler and unpublished.
        unsafe { Node::put_value(node, value) };
        self.link(&guard, node);
        Ok(())
    }

    /// Publish a filled node after the current last node.
    fn link(&self, _guard: &EpochGuard<'_, T>, node: NonNull<Node<T>>) {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            // Safety: `tail` is reachable or retired under our guard, so it
            // has not been recycled.
            let tail_next = unsafe { &(*tail).next };
            let next = tail_next.load(Ordering::Acquire);

            if next.is_null() {
                if tail_next
                    .compare_exchange_weak(
                        next,
                        node.as_ptr(),
                        Ordering::Release,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    // Best effort: another thread may already have helped.
                    let _ = self.tail.compare_exchange(
                        tail,
                        node.as_ptr(),
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    return;
                }
            } else {
                // Tail is lagging; help it along before retrying.
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
            }
            std::hint::spin_loop();
        }
    }

    /// Remove the value at the head into `out`.
    ///
    /// Returns `false` and leaves `out` untouched when the queue is empty.
    pub fn try_dequeue(&self, out: &mut T) -> bool {
        match self.pop() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Remove and return the value at the head, or `None` if the queue is
    /// empty.
    pub fn pop(&self) -> Option<T> {
        let guard = self.epoch.pin();
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            // Safety: protected by the guard.
            let next = unsafe { (*head).load_next() };

            if next.is_null() {
                return None;
            }
            if head == tail {
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed);
                std::hint::spin_loop();
                continue;
            }
            if self
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                // Safety: winning the CAS makes us the only reader of the new
                // sentinel's value, and the old sentinel is ours to retire.
                let value = unsafe {
                    let value = Node::take_value(NonNull::new_unchecked(next));
                    guard.retire(NonNull::new_unchecked(head));
                    value
                };
                debug_assert!(value.is_some(), "linked node without a value");
                // Close the guard before the caller drops anything.
                drop(guard);
                return value;
            }
            std::hint::spin_loop();
        }
    }

    /// Whether the queue looked empty at the moment of the call.
    pub fn is_empty(&self) -> bool {
        let _guard = self.epoch.pin();
        let head = self.head.load(Ordering::Acquire);
        // Safety: protected by the guard.
        unsafe { (*head).load_next().is_null() }
    }

    /// Snapshot of recycling and reclamation counters.
    pub fn stats(&self) -> QueueStats {
        self.epoch.stats()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let mut remaining = 0usize;
        let mut cursor = *self.head.get_mut();
        // The first node is the sentinel and holds no value.
        while let Some(node) = NonNull::new(cursor) {
            // Safety: `&mut self` means no operation is in flight, and every
            // node of the chain is owned by the queue.
            unsafe {
                cursor = node.as_ref().next.load(Ordering::Relaxed);
                Node::dealloc(node);
            }
            remaining += 1;
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                dropped_values = remaining.saturating_sub(1),
                stats = %self.epoch.stats(),
                "dropping queue"
            );
        }
        // The epoch manager releases retired and pooled nodes when it drops.
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
