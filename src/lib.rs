//! atomkit - lock-free building blocks for multi-threaded Rust programs
//!
//! The centerpiece is [`Queue`], an unbounded multi-producer/multi-consumer
//! FIFO queue built on the Michael-Scott linked-list algorithm:
//! - **Epoch-based reclamation**: dequeued nodes are retired and only freed
//!   once no thread can still be reading them
//! - **Node recycling**: reclaimed nodes go to a thread-local free list and
//!   spill to a shared lock-free stack, so steady-state traffic allocates
//!   nothing
//!
//! Smaller lock-free primitives live in [`primitives`].
//!
//! # Quick Start
//!
//! ```rust
//! use atomkit::Queue;
//!
//! let queue = Queue::new();
//! queue.enqueue(1);
//! queue.enqueue(2);
//!
//! let mut out = 0;
//! assert!(queue.try_dequeue(&mut out));
//! assert_eq!(out, 1);
//! assert_eq!(queue.pop(), Some(2));
//! assert!(queue.is_empty());
//! ```

#![warn(missing_docs)]

pub mod config;
mod epoch;
pub mod primitives;
pub mod queue;
mod recycle;
pub mod stats;

// Re-exports for convenience
pub use config::{AtomkitConfig, ConfigError};
pub use queue::{AllocError, Queue, QueueConfig};
pub use stats::QueueStats;

/// Constants used throughout the library
pub mod constants {
    /// Size of a cache line in bytes
    pub const CACHE_LINE_BYTES: usize = 64;
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{AtomkitConfig, ConfigError};
    pub use crate::primitives::{
        BoundCounter, Clamp, LfuCache, MinMax, RateLimiter, RingBuffer, TokenBucket,
    };
    pub use crate::queue::{AllocError, Queue, QueueConfig};
    pub use crate::stats::QueueStats;
}
