//! Loom-based model-checked tests for the queue's lock-free protocols.
//!
//! The production queue keeps per-thread state in `thread_local!` storage and
//! allocates through the global allocator, neither of which Loom instruments.
//! These tests instead replicate each protocol in a small test-local harness
//! built on loom atomics:
//!
//! - the Michael-Scott enqueue / dequeue CAS loops (`src/queue/mod.rs`)
//! - the epoch pin / advance / reclaim handshake (`src/epoch/manager.rs`)
//! - the free stack `push_chain` / `take_all` pair (`src/recycle/free_stack.rs`)
//!
//! Run with:
//! ```bash
//! cargo test --test loom_queue
//! ```

use std::ptr;

use loom::cell::UnsafeCell;
use loom::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use loom::sync::Arc;
use loom::thread;

// ---------------------------------------------------------------------------
// Test-local harness: Michael-Scott queue without reclamation.
//
// Dequeued sentinels are handed back to the caller as addresses and freed
// once the model run has joined every thread.
// ---------------------------------------------------------------------------

struct TestNode {
    value: UnsafeCell<Option<u32>>,
    next: AtomicPtr<TestNode>,
}

impl TestNode {
    fn alloc(value: Option<u32>) -> *mut TestNode {
        Box::into_raw(Box::new(TestNode {
            value: UnsafeCell::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

struct TestQueue {
    head: AtomicPtr<TestNode>,
    tail: AtomicPtr<TestNode>,
}

impl TestQueue {
    fn new() -> Self {
        let sentinel = TestNode::alloc(None);
        Self {
            head: AtomicPtr::new(sentinel),
            tail: AtomicPtr::new(sentinel),
        }
    }

    fn enqueue(&self, value: u32) {
        let node = TestNode::alloc(Some(value));
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }
            if !next.is_null() {
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }
            if unsafe {
                (*tail)
                    .next
                    .compare_exchange(next, node, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
            } {
                let _ =
                    self.tail
                        .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed);
                return;
            }
        }
    }

    /// Returns the value and the address of the unlinked sentinel.
    fn dequeue(&self) -> Option<(u32, usize)> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                return None;
            }
            if head == tail {
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }
            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let value = unsafe { (*next).value.with_mut(|slot| (*slot).take()) };
                let value = value.expect("shifted sentinel must hold a value");
                return Some((value, head as usize));
            }
        }
    }

    fn free_unlinked(retired: impl IntoIterator<Item = usize>) {
        for addr in retired {
            drop(unsafe { Box::from_raw(addr as *mut TestNode) });
        }
    }
}

impl Drop for TestQueue {
    fn drop(&mut self) {
        let mut cursor = self.head.load(Ordering::Relaxed);
        while !cursor.is_null() {
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next.load(Ordering::Relaxed);
        }
    }
}

/// Two producers race on the tail; both values must land exactly once.
#[test]
fn test_loom_concurrent_enqueue() {
    loom::model(|| {
        let queue = Arc::new(TestQueue::new());

        let q1 = Arc::clone(&queue);
        let q2 = Arc::clone(&queue);
        let h1 = thread::spawn(move || q1.enqueue(1));
        let h2 = thread::spawn(move || q2.enqueue(2));
        h1.join().unwrap();
        h2.join().unwrap();

        let mut seen = Vec::new();
        let mut retired = Vec::new();
        while let Some((value, node)) = queue.dequeue() {
            seen.push(value);
            retired.push(node);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
        TestQueue::free_unlinked(retired);
    });
}

/// A consumer racing a producer sees values in enqueue order.
#[test]
fn test_loom_enqueue_dequeue_order() {
    loom::model(|| {
        let queue = Arc::new(TestQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.enqueue(1);
                queue.enqueue(2);
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut got = Vec::new();
                let mut retired = Vec::new();
                for _ in 0..2 {
                    if let Some((value, node)) = queue.dequeue() {
                        got.push(value);
                        retired.push(node);
                    }
                }
                (got, retired)
            })
        };

        producer.join().unwrap();
        let (mut got, mut retired) = consumer.join().unwrap();
        while let Some((value, node)) = queue.dequeue() {
            got.push(value);
            retired.push(node);
        }
        assert_eq!(got, vec![1, 2]);
        TestQueue::free_unlinked(retired);
    });
}

/// Two consumers race for a single element; exactly one wins it.
#[test]
fn test_loom_single_element_single_winner() {
    loom::model(|| {
        let queue = Arc::new(TestQueue::new());
        queue.enqueue(7);

        let q1 = Arc::clone(&queue);
        let q2 = Arc::clone(&queue);
        let h1 = thread::spawn(move || q1.dequeue());
        let h2 = thread::spawn(move || q2.dequeue());
        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();

        assert!(r1.is_some() ^ r2.is_some());
        let (value, node) = r1.or(r2).unwrap();
        assert_eq!(value, 7);
        assert!(queue.dequeue().is_none());
        TestQueue::free_unlinked([node]);
    });
}

// ---------------------------------------------------------------------------
// Test-local harness: epoch handshake.
//
// `slot` stands in for the queue head. The reader pins and follows the
// pointer; the writer unlinks, retires with the current epoch and frees once
// the epoch has moved two steps past the retirement tag.
// ---------------------------------------------------------------------------

const SAFE_EPOCH_LAG: u64 = 2;

struct TestRecord {
    observed_epoch: AtomicU64,
    active: AtomicBool,
}

struct TestEpoch {
    global_epoch: AtomicU64,
    records: [TestRecord; 2],
    slot: AtomicUsize,
    freed: AtomicBool,
}

impl TestEpoch {
    fn new() -> Self {
        let record = || TestRecord {
            observed_epoch: AtomicU64::new(0),
            active: AtomicBool::new(false),
        };
        Self {
            global_epoch: AtomicU64::new(0),
            records: [record(), record()],
            slot: AtomicUsize::new(1),
            freed: AtomicBool::new(false),
        }
    }

    fn pin(&self, tid: usize) {
        let epoch = self.global_epoch.load(Ordering::SeqCst);
        self.records[tid]
            .observed_epoch
            .store(epoch, Ordering::SeqCst);
        self.records[tid].active.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    fn unpin(&self, tid: usize) {
        self.records[tid].active.store(false, Ordering::Release);
    }

    fn try_advance(&self) -> bool {
        let current = self.global_epoch.load(Ordering::SeqCst);
        fence(Ordering::SeqCst);
        for record in &self.records {
            if record.active.load(Ordering::SeqCst)
                && record.observed_epoch.load(Ordering::SeqCst) != current
            {
                return false;
            }
        }
        self.global_epoch
            .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }
}

/// A pinned reader that saw the old object never observes it freed.
#[test]
fn test_loom_pinned_reader_blocks_reclaim() {
    loom::model(|| {
        let epoch = Arc::new(TestEpoch::new());

        let reader = {
            let epoch = Arc::clone(&epoch);
            thread::spawn(move || {
                epoch.pin(0);
                if epoch.slot.load(Ordering::SeqCst) == 1 {
                    assert!(!epoch.freed.load(Ordering::SeqCst));
                }
                epoch.unpin(0);
            })
        };

        let writer = {
            let epoch = Arc::clone(&epoch);
            thread::spawn(move || {
                epoch.pin(1);
                epoch.slot.swap(2, Ordering::SeqCst);
                let tag = epoch.global_epoch.load(Ordering::SeqCst);
                for _ in 0..2 {
                    epoch.try_advance();
                }
                if tag + SAFE_EPOCH_LAG <= epoch.global_epoch.load(Ordering::SeqCst) {
                    epoch.freed.store(true, Ordering::SeqCst);
                }
                epoch.unpin(1);
            })
        };

        reader.join().unwrap();
        writer.join().unwrap();
    });
}

/// While a record stays pinned the epoch moves at most one step past the
/// epoch it observed.
#[test]
fn test_loom_active_record_caps_advance() {
    loom::model(|| {
        let epoch = Arc::new(TestEpoch::new());
        epoch.pin(0);
        let observed = epoch.records[0].observed_epoch.load(Ordering::SeqCst);

        let h1 = {
            let epoch = Arc::clone(&epoch);
            thread::spawn(move || {
                epoch.try_advance();
                epoch.try_advance();
            })
        };
        let h2 = {
            let epoch = Arc::clone(&epoch);
            thread::spawn(move || {
                epoch.try_advance();
            })
        };
        h1.join().unwrap();
        h2.join().unwrap();

        assert!(epoch.global_epoch.load(Ordering::SeqCst) <= observed + 1);
        epoch.unpin(0);
    });
}

// ---------------------------------------------------------------------------
// Test-local harness: free stack with chain push and take-all pop.
// ---------------------------------------------------------------------------

struct StackNode {
    id: u32,
    next: AtomicPtr<StackNode>,
}

struct TestFreeStack {
    head: AtomicPtr<StackNode>,
}

impl TestFreeStack {
    fn push_chain(&self, first: *mut StackNode, last: *mut StackNode) {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe { (*last).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange(head, first, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    fn take_all(&self) -> *mut StackNode {
        self.head.swap(ptr::null_mut(), Ordering::Acquire)
    }
}

fn chain(ids: &[u32]) -> (*mut StackNode, *mut StackNode) {
    let nodes: Vec<*mut StackNode> = ids
        .iter()
        .map(|&id| {
            Box::into_raw(Box::new(StackNode {
                id,
                next: AtomicPtr::new(ptr::null_mut()),
            }))
        })
        .collect();
    for pair in nodes.windows(2) {
        unsafe { (*pair[0]).next.store(pair[1], Ordering::Relaxed) };
    }
    (nodes[0], nodes[nodes.len() - 1])
}

fn drain(mut cursor: *mut StackNode, out: &mut Vec<u32>) {
    while !cursor.is_null() {
        let node = unsafe { Box::from_raw(cursor) };
        out.push(node.id);
        cursor = node.next.load(Ordering::Relaxed);
    }
}

/// Chains pushed concurrently with a take-all are neither lost nor split.
#[test]
fn test_loom_free_stack_chain_push_and_take_all() {
    loom::model(|| {
        let stack = Arc::new(TestFreeStack {
            head: AtomicPtr::new(ptr::null_mut()),
        });

        let pusher = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let (first, last) = chain(&[1, 2]);
                stack.push_chain(first, last);
            })
        };
        let taker = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let (first, last) = chain(&[3]);
                stack.push_chain(first, last);
                let mut taken = Vec::new();
                drain(stack.take_all(), &mut taken);
                taken
            })
        };

        pusher.join().unwrap();
        let mut seen = taker.join().unwrap();
        drain(stack.take_all(), &mut seen);

        // A chain is adopted whole or not at all.
        let pos1 = seen.iter().position(|&id| id == 1);
        let pos2 = seen.iter().position(|&id| id == 2);
        assert_eq!(pos1.map(|p| p + 1), pos2);

        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    });
}
