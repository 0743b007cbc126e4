//! Running minimum / maximum.

use std::fmt;
use std::sync::atomic::Ordering;

use super::AtomicPrimitive;

/// A cell that only moves towards a new minimum or maximum.
///
/// NaN arguments are ignored. A stored NaN is replaced by the next
/// non-NaN update in either direction.
pub struct MinMax<T: AtomicPrimitive> {
    value: T::Atomic,
}

impl<T: AtomicPrimitive> MinMax<T> {
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

    /// Store `value` if it is below the current one.
    pub fn update_min(&self, value: T) -> bool {
        self.update_if(value, |current| current <= value)
    }

    /// Store `value` if it is above the current one.
    pub fn update_max(&self, value: T) -> bool {
        self.update_if(value, |current| current >= value)
    }

    fn update_if(&self, value: T, keep: impl Fn(T) -> bool) -> bool {
        if value.is_nan() {
            return false;
        }
        let mut current = self.load();
        loop {
            if !current.is_nan() && keep(current) {
                return false;
            }
            match T::compare_exchange_weak(
                &self.value,
                current,
                value,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T: AtomicPrimitive + fmt::Debug> fmt::Debug for MinMax<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MinMax").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_min_max_updates() {
        let mm = MinMax::new(10.0f64);
        assert_eq!(mm.load(), 10.0);
        assert!(mm.update_min(5.0));
        assert_eq!(mm.load(), 5.0);
        assert!(!mm.update_min(6.0));
        assert!(mm.update_max(12.0));
        assert_eq!(mm.load(), 12.0);
        assert!(!mm.update_max(11.0));
        assert!(!mm.update_min(f64::NAN));
        assert!(!mm.update_max(f64::NAN));
        assert_eq!(mm.load(), 12.0);
    }

    #[test]
    fn test_stored_nan_is_replaced() {
        let mm = MinMax::new(f32::NAN);
        assert!(mm.update_max(-1.0));
        assert_eq!(mm.load(), -1.0);

        let mm = MinMax::new(f32::NAN);
        assert!(mm.update_min(100.0));
        assert_eq!(mm.load(), 100.0);
    }

    #[test]
    fn test_equal_value_is_not_a_change() {
        let mm = MinMax::new(7u32);
        assert!(!mm.update_min(7));
        assert!(!mm.update_max(7));
    }

    #[test]
    fn test_concurrent_max() {
        let mm = MinMax::new(0i64);
        thread::scope(|s| {
            for t in 0..4i64 {
                let mm = &mm;
                s.spawn(move || {
                    for i in 0..1000 {
                        mm.update_max(t * 1000 + i);
                    }
                });
            }
        });
        assert_eq!(mm.load(), 3999);
    }
}
