//! Epoch-based memory reclamation for the queue
//!
//! Every queue operation runs inside an [`EpochGuard`] that publishes the
//! global epoch the thread observed. Unlinked nodes are retired with the
//! epoch current at retirement time and only handed back to the recycler once
//! the global epoch has moved two steps past that tag, which proves that no
//! guard that could have seen the node is still open.
//!
//! Participant records are created lazily, one per thread and queue, and are
//! kept in an append-only list until the queue is dropped. A program that
//! spawns unboundedly many short-lived threads against one long-lived queue
//! therefore grows that list without bound.

mod manager;
mod record;
mod registry;

pub(crate) use manager::{EpochGuard, EpochManager};
