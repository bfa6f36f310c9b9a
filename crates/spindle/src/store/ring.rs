//! Circular buffer store
//!
//! Slots are reserved up front (the pool capacity when pre-allocating) and
//! the buffer only grows, by the same fixed step, if a caller overfills it.

use std::time::{Duration, Instant};

use super::WorkerStore;
use crate::worker::Worker;

/// Growth step when no reservation was requested
const DEFAULT_STEP: usize = 16;

#[derive(Debug)]
pub(crate) struct RingStore {
    slots: Vec<Option<Worker>>,
    /// Index of the least recently returned worker
    head: usize,
    len: usize,
    step: usize,
}

impl RingStore {
    pub(crate) fn with_capacity(slots: usize) -> Self {
        let step = if slots == 0 { DEFAULT_STEP } else { slots };
        Self {
            slots: (0..slots).map(|_| None).collect(),
            head: 0,
            len: 0,
            step,
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self) {
        let mut slots: Vec<Option<Worker>> = Vec::with_capacity(self.slots.len() + self.step);
        let len = self.len;
        while let Some(worker) = self.pop_oldest() {
            slots.push(Some(worker));
        }
        slots.resize_with(self.slots.len() + self.step, || None);
        self.slots = slots;
        self.head = 0;
        self.len = len;
    }

    fn pop_oldest(&mut self) -> Option<Worker> {
        if self.len == 0 {
            return None;
        }
        let worker = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        worker
    }

    fn expired_at(&mut self, now: Instant, expiry: Duration) -> Vec<Worker> {
        let mut expired = Vec::new();
        while self.len > 0 {
            let is_expired = self.slots[self.head]
                .as_ref()
                .is_some_and(|w| w.idle_for(now) > expiry);
            if !is_expired {
                break;
            }
            if let Some(worker) = self.pop_oldest() {
                expired.push(worker);
            }
        }
        expired
    }
}

impl WorkerStore for RingStore {
    fn len(&self) -> usize {
        self.len
    }

    fn insert(&mut self, worker: Worker) {
        if self.len == self.slots.len() {
            self.grow();
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(worker);
        self.len += 1;
    }

    fn detach(&mut self) -> Option<Worker> {
        if self.len == 0 {
            return None;
        }
        let newest = (self.head + self.len - 1) % self.slots.len();
        self.len -= 1;
        self.slots[newest].take()
    }

    fn retrieve_expired(&mut self, expiry: Duration) -> Vec<Worker> {
        self.expired_at(Instant::now(), expiry)
    }

    fn reset(&mut self) -> Vec<Worker> {
        let mut all = Vec::with_capacity(self.len);
        while let Some(worker) = self.pop_oldest() {
            all.push(worker);
        }
        self.head = 0;
        all
    }
}
