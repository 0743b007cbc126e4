//! Queue tuning knobs.

use crate::config::ConfigError;

/// Default number of retired nodes that triggers a reclamation scan.
pub const DEFAULT_RETIRE_THRESHOLD: usize = 64;

/// Default size at which a thread-local free list spills to the global stack.
pub const DEFAULT_LOCAL_CACHE_LIMIT: usize = 64;

/// Configuration for a [`Queue`](crate::Queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Retired nodes a thread accumulates before it scans for reclaimable
    /// ones.
    pub retire_threshold: usize,
    /// Size at which a thread's free list moves half of its nodes to the
    /// shared free stack.
    pub local_cache_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retire_threshold: DEFAULT_RETIRE_THRESHOLD,
            local_cache_limit: DEFAULT_LOCAL_CACHE_LIMIT,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retire threshold.
    pub fn with_retire_threshold(mut self, threshold: usize) -> Self {
        self.retire_threshold = threshold;
        self
    }

    /// Set the local free-list limit.
    pub fn with_local_cache_limit(mut self, limit: usize) -> Self {
        self.local_cache_limit = limit;
        self
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retire_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "queue.retire_threshold".into(),
                value: self.retire_threshold.to_string(),
            });
        }
        if self.local_cache_limit < 2 {
            return Err(ConfigError::InvalidValue {
                key: "queue.local_cache_limit".into(),
                value: self.local_cache_limit.to_string(),
            });
        }
        Ok(())
    }
}
