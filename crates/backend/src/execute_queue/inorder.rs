//! In-order execute queue: circular-buffer FIFO (spec.md §4.3). Dequeues
//! only the head and stalls the whole queue when the head isn't ready yet,
//! even if younger entries behind it have already resolved — the shape
//! required for instruction subclasses (memory ops) that must execute in
//! issue order.

use super::{Broadcast, ExecuteEntry};
use crate::common::error::ConfigError;

/// Circular-buffer FIFO, built the same way as [`crate::retirement::rob::Rob`]
/// and [`crate::retirement::store_queue::StoreQueue`].
#[derive(Debug)]
pub struct InOrderQueue {
    entries: Vec<ExecuteEntry>,
    head: usize,
    tail: usize,
    count: usize,
}

impl InOrderQueue {
    pub fn try_new(depth: usize) -> Result<Self, ConfigError> {
        if depth == 0 {
            return Err(ConfigError::ZeroDepth("in-order execute queue"));
        }
        let mut entries = Vec::with_capacity(depth);
        entries.resize_with(depth, ExecuteEntry::default);
        Ok(Self {
            entries,
            head: 0,
            tail: 0,
            count: 0,
        })
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Enqueues at the tail. Returns `None` if the queue is full — the
    /// issue stage's enqueue handshake stalls in that case.
    pub fn enqueue(&mut self, entry: ExecuteEntry) -> Option<()> {
        if self.is_full() {
            return None;
        }
        self.entries[self.tail] = entry;
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        Some(())
    }

    /// Fans a broadcast out to every occupied entry.
    pub fn broadcast(&mut self, broadcast: Broadcast) {
        let cap = self.entries.len();
        let mut idx = self.head;
        for _ in 0..self.count {
            self.entries[idx].resolve(broadcast);
            idx = (idx + 1) % cap;
        }
    }

    /// Dequeues the head if it's ready; stalls (returns `None`) otherwise.
    pub fn dequeue(&mut self) -> Option<ExecuteEntry> {
        if self.count == 0 || !self.entries[self.head].is_ready() {
            return None;
        }
        let entry = self.entries[self.head];
        self.entries[self.head] = ExecuteEntry::default();
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        Some(entry)
    }

    /// Invalidates every occupied entry in place; each drains as a bubble
    /// on its normal turn rather than being removed immediately.
    pub fn recover(&mut self) {
        let cap = self.entries.len();
        let mut idx = self.head;
        for _ in 0..self.count {
            self.entries[idx].valid = false;
            idx = (idx + 1) % cap;
        }
    }
}
