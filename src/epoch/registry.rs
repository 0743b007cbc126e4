//! Thread-local lookup of participant records.
//!
//! Each thread keeps a short list of `(manager id, record)` slots. Manager
//! ids come from a process-wide counter and are never reused, so a slot left
//! behind by a dropped queue can never match a newer queue that happens to
//! live at the same address.

use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// Global counter for allocating manager ids
static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

struct Slot {
    manager_id: u64,
    /// Dead once the owning manager is dropped; used for pruning only.
    alive: Weak<()>,
    record: NonNull<()>,
}

thread_local! {
    static SLOTS: RefCell<Vec<Slot>> = const { RefCell::new(Vec::new()) };
}

/// Allocate a fresh, never reused manager id.
#[inline]
pub(crate) fn next_manager_id() -> u64 {
    NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Find the calling thread's record for `manager_id`.
///
/// Returns `None` when the thread has no record yet, or when thread-local
/// storage is already being torn down.
#[inline]
pub(crate) fn lookup(manager_id: u64) -> Option<NonNull<()>> {
    SLOTS
        .try_with(|slots| {
            slots
                .borrow()
                .iter()
                .find(|slot| slot.manager_id == manager_id)
                .map(|slot| slot.record)
        })
        .ok()
        .flatten()
}

/// Remember `record` as the calling thread's record for `manager_id`.
///
/// Slots of managers that no longer exist are dropped on the way. Returns
/// `false` if thread-local storage is unavailable, in which case the caller
/// will not find the record again.
pub(crate) fn register(manager_id: u64, alive: Weak<()>, record: NonNull<()>) -> bool {
    SLOTS
        .try_with(|slots| {
            let mut slots = slots.borrow_mut();
            slots.retain(|slot| slot.alive.strong_count() > 0);
            slots.push(Slot {
                manager_id,
                alive,
                record,
            });
        })
        .is_ok()
}

/// Number of live slots held by the calling thread.
#[cfg(test)]
pub(crate) fn live_slots() -> usize {
    SLOTS.with(|slots| {
        slots
            .borrow()
            .iter()
            .filter(|slot| slot.alive.strong_count() > 0)
            .count()
    })
}
