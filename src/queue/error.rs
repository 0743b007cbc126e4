//! Queue error types.

use std::alloc::Layout;
use std::error::Error;
use std::fmt;

/// Node allocation failed; the value that could not be enqueued is handed
/// back.
pub struct AllocError<T> {
    value: T,
    layout: Layout,
}

impl<T> AllocError<T> {
    pub(crate) fn new(value: T, layout: Layout) -> Self {
        Self { value, layout }
    }

    /// Recover the value that was not enqueued.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Layout of the node allocation that failed.
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocError")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to allocate a queue node ({} bytes)",
            self.layout.size()
        )
    }
}

impl<T> Error for AllocError<T> {}
