//! Small lock-free primitives.
//!
//! - **[`BoundCounter`]**: counter kept inside `[0, cap]`
//! - **[`Clamp`]**: value that can be pulled into a range
//! - **[`MinMax`]**: running minimum / maximum
//! - **[`RateLimiter`]**: fixed-window admission counter
//! - **[`TokenBucket`]**: token bucket refilled by a background thread
//! - **[`RingBuffer`]**: bounded MPMC ring
//! - **[`LfuCache`]**: least-frequently-used cache (mutex protected)
//!
//! The numeric primitives are generic over [`AtomicPrimitive`], which covers
//! every integer type plus `f32`/`f64` (stored as their bit patterns).

mod clamp;
mod counter;
mod lfu;
mod min_max;
mod rate_limiter;
mod ring;
mod token_bucket;

pub use clamp::Clamp;
pub use counter::BoundCounter;
pub use lfu::LfuCache;
pub use min_max::MinMax;
pub use rate_limiter::RateLimiter;
pub use ring::RingBuffer;
pub use token_bucket::TokenBucket;

use std::ops::{Add, Sub};
use std::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU64,
    AtomicU8, AtomicUsize, Ordering,
};

mod sealed {
    pub trait Sealed {}
}

/// Arithmetic types with a lock-free atomic cell.
///
/// This trait is sealed.
pub trait AtomicPrimitive:
    sealed::Sealed
    + Copy
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Backing atomic cell.
    type Atomic: Send + Sync;

    /// Additive identity.
    const ZERO: Self;

    #[doc(hidden)]
    fn new_atomic(value: Self) -> Self::Atomic;

    #[doc(hidden)]
    fn load(atomic: &Self::Atomic, order: Ordering) -> Self;

    #[doc(hidden)]
    fn compare_exchange_weak(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;

    /// `true` only for floating point NaN.
    fn is_nan(self) -> bool {
        false
    }
}

macro_rules! impl_atomic_int {
    ($($ty:ty => $atomic:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl AtomicPrimitive for $ty {
                type Atomic = $atomic;

                const ZERO: Self = 0;

                #[inline]
                fn new_atomic(value: Self) -> Self::Atomic {
                    <$atomic>::new(value)
                }

                #[inline]
                fn load(atomic: &Self::Atomic, order: Ordering) -> Self {
                    atomic.load(order)
                }

                #[inline]
                fn compare_exchange_weak(
                    atomic: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    atomic.compare_exchange_weak(current, new, success, failure)
                }
            }
        )*
    };
}

macro_rules! impl_atomic_float {
    ($($ty:ty => $atomic:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl AtomicPrimitive for $ty {
                type Atomic = $atomic;

                const ZERO: Self = 0.0;

                #[inline]
                fn new_atomic(value: Self) -> Self::Atomic {
                    <$atomic>::new(value.to_bits())
                }

                #[inline]
                fn load(atomic: &Self::Atomic, order: Ordering) -> Self {
                    <$ty>::from_bits(atomic.load(order))
                }

                #[inline]
                fn compare_exchange_weak(
                    atomic: &Self::Atomic,
                    current: Self,
                    new: Self,
                    success: Ordering,
                    failure: Ordering,
                ) -> Result<Self, Self> {
                    atomic
                        .compare_exchange_weak(current.to_bits(), new.to_bits(), success, failure)
                        .map(<$ty>::from_bits)
                        .map_err(<$ty>::from_bits)
                }

                #[inline]
                fn is_nan(self) -> bool {
                    <$ty>::is_nan(self)
                }
            }
        )*
    };
}

impl_atomic_int!(
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
);

impl_atomic_float!(f32 => AtomicU32, f64 => AtomicU64);
