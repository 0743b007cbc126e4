//! Bounded counter.

use std::fmt;
use std::sync::atomic::Ordering;

use super::AtomicPrimitive;

/// A counter that stays inside `[0, cap]`.
///
/// Additions that would overshoot the cap and subtractions that would go
/// below zero are refused instead of clamped.
pub struct BoundCounter<T: AtomicPrimitive> {
    cap: T,
    current: T::Atomic,
}

impl<T: AtomicPrimitive> BoundCounter<T> {
    /// Create an empty counter with the given cap.
    pub fn new(cap: T) -> Self {
        Self {
            cap,
            current: T::new_atomic(T::ZERO),
        }
    }

    /// Current value.
    pub fn load(&self) -> T {
        T::load(&self.current, Ordering::Relaxed)
    }

    /// Upper bound.
    pub fn capacity(&self) -> T {
        self.cap
    }

    /// Add `value` if the result stays at or below the cap.
    pub fn try_add(&self, value: T) -> bool {
        if value < T::ZERO || value > self.cap || value.is_nan() {
            return false;
        }
        let mut current = self.load();
        loop {
            // `cap - value` cannot underflow: 0 <= value <= cap.
            if current > self.cap - value {
                return false;
            }
            match T::compare_exchange_weak(
                &self.current,
                current,
                current + value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Subtract `value` if the result stays at or above zero.
    pub fn try_sub(&self, value: T) -> bool {
        if value < T::ZERO || value.is_nan() {
            return false;
        }
        let mut current = self.load();
        loop {
            if current < value {
                return false;
            }
            match T::compare_exchange_weak(
                &self.current,
                current,
                current - value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T: AtomicPrimitive + fmt::Debug> fmt::Debug for BoundCounter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCounter")
            .field("current", &self.load())
            .field("cap", &self.cap)
            .finish()
    }
}
