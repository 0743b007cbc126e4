//! Thread-local LIFO cache of reclaimed nodes.

use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering;

use crate::queue::node::Node;

/// Intrusive singly-linked LIFO threaded through `Node::next`.
pub(crate) struct LocalFreeList<T> {
    head: *mut Node<T>,
    len: usize,
}

impl<T> LocalFreeList<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Push an owned, reset node.
    pub(crate) fn push(&mut self, node: NonNull<Node<T>>) {
        // Safety: the caller hands over exclusive ownership of `node`.
        unsafe { node.as_ref().next.store(self.head, Ordering::Relaxed) };
        self.head = node.as_ptr();
        self.len += 1;
    }

    /// Pop a node, returning it unlinked.
    pub(crate) fn pop(&mut self) -> Option<NonNull<Node<T>>> {
        let node = NonNull::new(self.head)?;
        // Safety: nodes on the list are owned by the list.
        unsafe {
            self.head = node.as_ref().next.load(Ordering::Relaxed);
            node.as_ref().next.store(ptr::null_mut(), Ordering::Relaxed);
        }
        self.len -= 1;
        Some(node)
    }

    /// Adopt a whole null-terminated chain detached from the global stack.
    ///
    /// # Safety
    /// Every node of `chain` must be exclusively owned by the caller.
    pub(crate) unsafe fn adopt_chain(&mut self, chain: *mut Node<T>) {
        let mut cursor = chain;
        while let Some(node) = NonNull::new(cursor) {
            cursor = node.as_ref().next.load(Ordering::Relaxed);
            self.push(node);
        }
    }

    /// Detach nodes until `keep` remain, returning the detached chain as
    /// `(first, last)` linked through `next`.
    pub(crate) fn split_to(&mut self, keep: usize) -> Option<(NonNull<Node<T>>, NonNull<Node<T>>)> {
        if self.len <= keep {
            return None;
        }
        let first = self.pop()?;
        let mut last = first;
        while self.len > keep {
            let Some(node) = self.pop() else { break };
            // Safety: both nodes are owned by this list until handed out.
            unsafe { last.as_ref().next.store(node.as_ptr(), Ordering::Relaxed) };
            last = node;
        }
        Some((first, last))
    }

    /// Release every cached node.
    ///
    /// # Safety
    /// No node on the list may be referenced elsewhere.
    pub(crate) unsafe fn release_all(&mut self) -> usize {
        let mut released = 0;
        while let Some(node) = self.pop() {
            Node::dealloc(node);
            released += 1;
        }
        released
    }
}

/// Owner-only wrapper that lets a per-thread record hold its free list.
pub(crate) struct LocalCache<T> {
    list: UnsafeCell<LocalFreeList<T>>,
}

impl<T> LocalCache<T> {
    pub(crate) const fn new() -> Self {
        Self {
            list: UnsafeCell::new(LocalFreeList::new()),
        }
    }

    /// Run `f` with the free list.
    ///
    /// # Safety
    /// Only the thread owning the enclosing record may call this (or any
    /// thread holding exclusive access during teardown), and `f` must not
    /// re-enter the same cache.
    #[inline]
    pub(crate) unsafe fn with<R>(&self, f: impl FnOnce(&mut LocalFreeList<T>) -> R) -> R {
        f(&mut *self.list.get())
    }
}
