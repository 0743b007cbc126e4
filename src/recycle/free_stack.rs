//! Global lock-free stack of reclaimed nodes.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::queue::node::Node;

/// Treiber stack used as the overflow pool behind the per-thread caches.
///
/// Pushes are ordinary CAS loops. There is no single-node pop: consumers
/// detach the whole stack with one swap, so nobody ever reads `next` of a
/// node another thread may have taken, reused and pushed back.
pub(crate) struct FreeStack<T> {
    head: AtomicPtr<Node<T>>,
}

impl<T> FreeStack<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Push a single owned node.
    pub(crate) fn push(&self, node: NonNull<Node<T>>) {
        self.push_chain(node, node);
    }

    /// Push a chain `first ..= last` already linked through `next`.
    pub(crate) fn push_chain(&self, first: NonNull<Node<T>>, last: NonNull<Node<T>>) {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // Safety: the chain is owned by the caller until the CAS below
            // publishes it.
            unsafe { last.as_ref().next.store(head, Ordering::Relaxed) };
            match self.head.compare_exchange_weak(
                head,
                first.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    head = actual;
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Detach every pooled node. The returned chain is owned by the caller.
    pub(crate) fn take_all(&self) -> *mut Node<T> {
        if self.head.load(Ordering::Relaxed).is_null() {
            return ptr::null_mut();
        }
        self.head.swap(ptr::null_mut(), Ordering::Acquire)
    }

    /// Whether the stack currently looks empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }
}

impl<T> Drop for FreeStack<T> {
    fn drop(&mut self) {
        let mut cursor = *self.head.get_mut();
        while let Some(node) = NonNull::new(cursor) {
            // Safety: `&mut self` means no other thread can reach the stack.
            unsafe {
                cursor = node.as_ref().next.load(Ordering::Relaxed);
                Node::dealloc(node);
            }
        }
    }
}
