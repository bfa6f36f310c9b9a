//! Growable LIFO array store

use std::time::{Duration, Instant};

use super::WorkerStore;
use crate::worker::Worker;

/// Idle workers in a `Vec`, oldest at index 0
#[derive(Debug, Default)]
pub(crate) struct StackStore {
    items: Vec<Worker>,
}

impl StackStore {
    pub(crate) fn with_capacity(slots: usize) -> Self {
        Self {
            items: Vec::with_capacity(slots),
        }
    }

    fn expired_at(&mut self, now: Instant, expiry: Duration) -> Vec<Worker> {
        // Sorted by return time, so the expired workers form a prefix
        let n = self.items.partition_point(|w| w.idle_for(now) > expiry);
        self.items.drain(..n).collect()
    }
}

impl WorkerStore for StackStore {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn insert(&mut self, worker: Worker) {
        self.items.push(worker);
    }

    fn detach(&mut self) -> Option<Worker> {
        self.items.pop()
    }

    fn retrieve_expired(&mut self, expiry: Duration) -> Vec<Worker> {
        self.expired_at(Instant::now(), expiry)
    }

    fn reset(&mut self) -> Vec<Worker> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(base: Instant, ages_ms: &[u64]) -> StackStore {
        let mut store = StackStore::with_capacity(ages_ms.len());
        for (i, offset) in ages_ms.iter().enumerate() {
            let at = base + Duration::from_millis(*offset);
            let (worker, _rx) = Worker::detached(i as u64, at);
            store.insert(worker);
        }
        store
    }

    #[test]
    fn test_expired_prefix_only() {
        let base = Instant::now();
        let mut store = filled(base, &[0, 10, 20, 300, 310]);

        let now = base + Duration::from_millis(400);
        let expired = store.expired_at(now, Duration::from_millis(200));

        let ids: Vec<u64> = expired.iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.detach().map(|w| w.id()), Some(4));
    }

    #[test]
    fn test_nothing_expired() {
        let base = Instant::now();
        let mut store = filled(base, &[0, 5]);
        let now = base + Duration::from_millis(10);
        let expired = store.expired_at(now, Duration::from_secs(1));
        assert!(expired.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_exact_expiry_is_kept() {
        let base = Instant::now();
        let mut store = filled(base, &[0]);
        let now = base + Duration::from_millis(50);
        let expired = store.expired_at(now, Duration::from_millis(50));
        assert!(expired.is_empty());
    }

    #[test]
    fn test_reset_drains_everything() {
        let base = Instant::now();
        let mut store = filled(base, &[0, 1, 2]);
        let drained: Vec<u64> = store.reset().iter().map(|w| w.id()).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(store.is_empty());
    }
}
