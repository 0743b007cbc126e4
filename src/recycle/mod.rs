//! Node recycling.
//!
//! Reclaimed nodes go to a small per-thread cache first and overflow into a
//! global lock-free stack, so steady-state enqueue/dequeue traffic does not hit
//! the allocator. Recycling is purely a throughput measure: a node that cannot
//! be reused is simply allocated fresh.

mod free_list;
mod free_stack;

use std::ptr::NonNull;

use crossbeam::utils::CachePadded;

use crate::queue::node::Node;
use crate::stats::RecordCounters;

pub(crate) use free_list::LocalCache;
use free_stack::FreeStack;

/// Hands out and takes back node storage for one queue.
pub(crate) struct Recycler<T> {
    global: CachePadded<FreeStack<T>>,
    local_cache_limit: usize,
}

impl<T> Recycler<T> {
    pub(crate) fn new(local_cache_limit: usize) -> Self {
        Self {
            global: CachePadded::new(FreeStack::new()),
            local_cache_limit,
        }
    }

    pub(crate) fn local_cache_limit(&self) -> usize {
        self.local_cache_limit
    }

    /// Get an empty, unlinked node.
    ///
    /// Order of preference: the caller's local cache, a batch detached from
    /// the global stack, a fresh allocation. `None` means the allocator is
    /// exhausted.
    ///
    /// # Safety
    /// `cache` must belong to the calling thread (see [`LocalCache::with`]).
    pub(crate) unsafe fn acquire(
        &self,
        cache: &LocalCache<T>,
        counters: &RecordCounters,
    ) -> Option<NonNull<Node<T>>> {
        if let Some(node) = cache.with(|list| list.pop()) {
            RecordCounters::add(&counters.local_reuses, 1);
            return Some(node);
        }

        let batch = self.global.take_all();
        if !batch.is_null() {
            let node = cache.with(|list| {
                list.adopt_chain(batch);
                list.pop()
            });
            if node.is_some() {
                RecordCounters::add(&counters.global_reuses, 1);
                return node;
            }
        }

        match Node::try_alloc() {
            Some(node) => {
                RecordCounters::add(&counters.fresh_allocations, 1);
                Some(node)
            }
            None => {
                tracing::warn!(
                    size = Node::<T>::LAYOUT.size(),
                    "queue node allocation failed"
                );
                None
            }
        }
    }

    /// Take back a node that is provably unreachable from the queue.
    ///
    /// The node's value slot is cleared first; any stale value is dropped
    /// before the cache is touched. When the local cache reaches its limit,
    /// half of it moves to the global stack.
    ///
    /// # Safety
    /// The caller must own `node` exclusively and `cache` must belong to the
    /// calling thread.
    pub(crate) unsafe fn reclaim(
        &self,
        cache: &LocalCache<T>,
        counters: &RecordCounters,
        node: NonNull<Node<T>>,
    ) {
        drop(Node::reset(node));

        let limit = self.local_cache_limit;
        let spill = cache.with(|list| {
            list.push(node);
            if list.len() >= limit {
                list.split_to(limit / 2)
            } else {
                None
            }
        });

        if let Some((first, last)) = spill {
            let mut moved = 1;
            let mut cursor = first;
            while cursor != last {
                cursor = NonNull::new_unchecked(cursor.as_ref().load_next());
                moved += 1;
            }
            self.global.push_chain(first, last);
            RecordCounters::add(&counters.spilled, moved);
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!(moved, "spilled local free list to global stack");
            }
        }
    }

    /// Whether the global stack currently holds any node.
    pub(crate) fn has_global_nodes(&self) -> bool {
        !self.global.is_empty()
    }
}
