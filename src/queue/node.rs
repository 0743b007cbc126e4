//! Linked-list node shared by the queue chain, the free lists and the
//! retired lists.

use std::alloc::{alloc, Layout};
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// A single link of the queue chain.
///
/// The value slot is only touched by the thread that currently owns the node:
/// the enqueuer before publication, the dequeuer that won the `head` CAS onto
/// it, or the reclaimer once the epoch manager proved it unreachable.
pub(crate) struct Node<T> {
    value: UnsafeCell<Option<T>>,
    pub(crate) next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    /// Layout used for fresh node allocations.
    pub(crate) const LAYOUT: Layout = Layout::new::<Node<T>>();

    const fn empty() -> Self {
        Self {
            value: UnsafeCell::new(None),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Allocate an empty, unlinked node.
    ///
    /// Returns `None` when the global allocator is exhausted.
    pub(crate) fn try_alloc() -> Option<NonNull<Node<T>>> {
        // Safety: `Node<T>` always contains an `AtomicPtr`, so the layout is
        // never zero-sized.
        let raw = unsafe { alloc(Self::LAYOUT) } as *mut Node<T>;
        let node = NonNull::new(raw)?;
        // Safety: freshly allocated with the layout of `Node<T>`.
        unsafe { node.as_ptr().write(Self::empty()) };
        Some(node)
    }

    /// Allocate the permanent sentinel, aborting on allocation failure.
    pub(crate) fn alloc_sentinel() -> NonNull<Node<T>> {
        match Self::try_alloc() {
            Some(node) => node,
            None => std::alloc::handle_alloc_error(Self::LAYOUT),
        }
    }

    /// Release a node and whatever value it still holds.
    ///
    /// # Safety
    /// `node` must come from [`Node::try_alloc`] and be exclusively owned by
    /// the caller. It must not be used afterwards.
    pub(crate) unsafe fn dealloc(node: NonNull<Node<T>>) {
        // `try_alloc` uses the global allocator with `Layout::new::<Node<T>>`,
        // which is exactly what `Box<Node<T>>` expects.
        drop(Box::from_raw(node.as_ptr()));
    }

    /// Store a value into an owned, unpublished node.
    ///
    /// # Safety
    /// The caller must own `node` exclusively.
    pub(crate) unsafe fn put_value(node: NonNull<Node<T>>, value: T) {
        *(*node.as_ptr()).value.get() = Some(value);
    }

    /// Move the value out of a node.
    ///
    /// # Safety
    /// The caller must be the only thread allowed to touch the value slot.
    pub(crate) unsafe fn take_value(node: NonNull<Node<T>>) -> Option<T> {
        (*(*node.as_ptr()).value.get()).take()
    }

    /// Reset an owned node so it can go back on a free list.
    ///
    /// Returns the stale value (if any) so the caller decides where it is
    /// dropped.
    ///
    /// # Safety
    /// The caller must own `node` exclusively.
    pub(crate) unsafe fn reset(node: NonNull<Node<T>>) -> Option<T> {
        let stale = Self::take_value(node);
        node.as_ref().next.store(ptr::null_mut(), Ordering::Relaxed);
        stale
    }

    /// Load `next` for a dereference (acquire).
    #[inline]
    pub(crate) fn load_next(&self) -> *mut Node<T> {
        self.next.load(Ordering::Acquire)
    }
}
