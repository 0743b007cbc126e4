//! Atomic clamp.

use std::fmt;
use std::sync::atomic::Ordering;

use super::AtomicPrimitive;

/// A value that can be pulled into a range atomically.
pub struct Clamp<T: AtomicPrimitive> {
    value: T::Atomic,
}

impl<T: AtomicPrimitive> Clamp<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: T::new_atomic(value),
        }
    }

    /// Current value.
    pub fn load(&self) -> T {
        T::load(&self.value, Ordering::Relaxed)
    }

    /// Move the value into `[low, high]`.
    ///
    /// Returns `true` if the stored value changed.
    pub fn clamp_to(&self, low: T, high: T) -> bool {
        debug_assert!(low <= high, "clamp_to requires low <= high");
        let mut current = self.load();
        loop {
            let target = if current < low {
                low
            } else if current > high {
                high
            } else {
                return false;
            };
            match T::compare_exchange_weak(
                &self.value,
                current,
                target,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T: AtomicPrimitive + fmt::Debug> fmt::Debug for Clamp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clamp").field(&self.load()).finish()
    }
}
