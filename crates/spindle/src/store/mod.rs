//! Idle-worker stores
//!
//! This module provides:
//! - [`WorkerStore`] - the capability every idle store offers the pool
//! - [`StackStore`] - growable LIFO array
//! - [`RingStore`] - circular buffer that grows in fixed steps
//!
//! Both keep workers ordered by the time they were returned: inserts and
//! detaches happen at the most-recently-used end, expiry scans start at the
//! least-recently-used end and stop at the first worker still in its window.

mod ring;
mod stack;

use std::time::Duration;

pub(crate) use ring::RingStore;
pub(crate) use stack::StackStore;

use crate::options::StoreKind;
use crate::worker::Worker;

/// Container of idle workers, ordered by recency of return
pub(crate) trait WorkerStore: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a worker at the most-recently-used end
    fn insert(&mut self, worker: Worker);

    /// Remove the most recently returned worker
    fn detach(&mut self) -> Option<Worker>;

    /// Remove every worker idle for longer than `expiry`, oldest first
    fn retrieve_expired(&mut self, expiry: Duration) -> Vec<Worker>;

    /// Remove all workers, oldest first
    fn reset(&mut self) -> Vec<Worker>;
}

/// Build the store for a strategy; `slots` is the reservation hint
pub(crate) fn new_store(kind: StoreKind, slots: usize) -> Box<dyn WorkerStore> {
    match kind {
        StoreKind::Stack => Box::new(StackStore::with_capacity(slots)),
        StoreKind::Ring => Box::new(RingStore::with_capacity(slots)),
    }
}
