//! Reorder buffer: a circular table of two-wide retirement rows.
//!
//! Structurally a circular buffer like any other in-flight instruction
//! queue, but addressed so retirement always drains it two slots at a time
//! (spec.md §4.5, §6.5): the ROB index's low bit selects slot 0 vs slot 1 of
//! a row, and the retirement port consumes both.

use crate::common::error::ConfigError;
use crate::execute_result::{ExecuteResult, RobRetireEntry, RobTag};

/// Reorder buffer — fixed-capacity circular table of [`RobRetireEntry`].
#[derive(Debug)]
pub struct Rob {
    entries: Vec<RobRetireEntry>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Rob {
    /// Builds a ROB with the given depth. Depth must be even and non-zero,
    /// since retirement always processes a row of two slots.
    pub fn try_new(depth: usize) -> Result<Self, ConfigError> {
        if depth == 0 {
            return Err(ConfigError::ZeroDepth("rob"));
        }
        if depth % 2 != 0 {
            return Err(ConfigError::OddRobDepth(depth));
        }
        let mut entries = Vec::with_capacity(depth);
        entries.resize_with(depth, RobRetireEntry::default);
        Ok(Self {
            entries,
            head: 0,
            tail: 0,
            count: 0,
        })
    }

    /// Returns the ROB's configured depth.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no instructions are in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the ROB cannot accept another allocation.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Allocates a new row entry at issue. Returns `None` if the ROB is full.
    pub fn allocate(&mut self, pc: u64, spec: u64, rd: u8) -> Option<RobTag> {
        if self.is_full() {
            return None;
        }
        let tag = RobTag(self.tail as u32);
        self.entries[self.tail] = RobRetireEntry {
            valid: true,
            commit: false,
            pc,
            spec,
            rd,
            execute_result: ExecuteResult::default(),
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        Some(tag)
    }

    /// Records a functional unit's result and marks the entry ready to retire.
    pub fn complete(&mut self, tag: RobTag, execute_result: ExecuteResult) {
        let entry = &mut self.entries[tag.0 as usize];
        if entry.valid {
            entry.execute_result = execute_result;
            entry.commit = true;
        }
    }

    /// Returns the entry at logical offset `offset` from the head (0 or 1),
    /// or `None` if that offset is beyond the last allocated row — such an
    /// offset is a bubble that is always ready to retire.
    fn peek(&self, offset: usize) -> Option<RobRetireEntry> {
        if offset >= self.count {
            return None;
        }
        Some(self.entries[(self.head + offset) % self.entries.len()])
    }

    /// True if the slot at `offset` is ready to retire: either a real entry
    /// whose functional unit has completed it, or a bubble.
    fn ready(&self, offset: usize) -> bool {
        self.peek(offset).is_none_or(|e| e.commit || !e.valid)
    }

    /// Pops the head entry unconditionally, advancing the ROB by one slot.
    fn pop_front(&mut self) -> RobRetireEntry {
        let entry = self.entries[self.head];
        self.entries[self.head] = RobRetireEntry::default();
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        entry
    }

    /// True when both the head and the following slot (bubble-extended) are
    /// ready to retire, the gate the whole two-wide retirement unit fires on
    /// (spec.md §4.5).
    #[must_use]
    pub fn head_ready(&self) -> bool {
        self.count > 0 && self.ready(0) && self.ready(1)
    }

    /// Pops slot 0. Caller must have checked [`Self::head_ready`] first.
    pub fn pop_slot0(&mut self) -> RobRetireEntry {
        self.pop_front()
    }

    /// Pops slot 1 if a second row entry exists. Caller must have checked
    /// [`Self::head_ready`] and that slot 0's disposition did not stop.
    pub fn pop_slot1(&mut self) -> Option<RobRetireEntry> {
        if self.count > 0 {
            Some(self.pop_front())
        } else {
            None
        }
    }

    /// Invalidates every row allocated *after* `keep_tag` (inclusive of
    /// `keep_tag` itself being kept). Used on recovery to drop everything
    /// younger than the instruction that triggered it.
    pub fn flush_after(&mut self, keep_tag: RobTag) {
        if self.count == 0 {
            return;
        }
        let mut idx = self.head;
        let mut found = false;
        for _ in 0..self.count {
            if idx == keep_tag.0 as usize {
                found = true;
                break;
            }
            idx = (idx + 1) % self.entries.len();
        }
        if !found {
            return;
        }
        let keep_idx = (idx + 1) % self.entries.len();
        let mut remove_idx = keep_idx;
        while remove_idx != self.tail {
            self.entries[remove_idx] = RobRetireEntry::default();
            remove_idx = (remove_idx + 1) % self.entries.len();
        }
        self.tail = keep_idx;
        self.count = 0;
        let mut i = self.head;
        while i != self.tail {
            if self.entries[i].valid {
                self.count += 1;
            }
            i = (i + 1) % self.entries.len();
        }
    }

    /// Invalidates every in-flight row. Used on a full pipeline flush.
    pub fn flush_all(&mut self) {
        for entry in &mut self.entries {
            *entry = RobRetireEntry::default();
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_depth_is_rejected() {
        assert!(matches!(Rob::try_new(0), Err(ConfigError::ZeroDepth("rob"))));
    }

    #[test]
    fn odd_depth_is_rejected() {
        assert!(matches!(Rob::try_new(3), Err(ConfigError::OddRobDepth(3))));
    }

    #[test]
    fn retire_stalls_until_both_slots_ready() {
        let mut rob = Rob::try_new(4).unwrap();
        let t0 = rob.allocate(0x1000, 0x1004, 1).unwrap();
        let _t1 = rob.allocate(0x1004, 0x1008, 2).unwrap();

        assert!(!rob.head_ready());

        rob.complete(t0, ExecuteResult::default());
        assert!(!rob.head_ready());
    }

    #[test]
    fn retires_both_slots_when_ready_and_no_stop() {
        let mut rob = Rob::try_new(4).unwrap();
        let t0 = rob.allocate(0x1000, 0x1004, 1).unwrap();
        let t1 = rob.allocate(0x1004, 0x1008, 2).unwrap();
        rob.complete(t0, ExecuteResult::default());
        rob.complete(t1, ExecuteResult::default());

        assert!(rob.head_ready());
        let s0 = rob.pop_slot0();
        let s1 = rob.pop_slot1().unwrap();
        assert!(s0.valid);
        assert!(s1.valid);
        assert!(rob.is_empty());
    }

    #[test]
    fn stop_on_slot0_leaves_slot1_for_next_cycle() {
        let mut rob = Rob::try_new(4).unwrap();
        let t0 = rob.allocate(0x1000, 0x1004, 1).unwrap();
        let t1 = rob.allocate(0x1004, 0x2000, 2).unwrap();
        rob.complete(t0, ExecuteResult::default());
        rob.complete(t1, ExecuteResult::default());

        assert!(rob.head_ready());
        let s0 = rob.pop_slot0();
        assert!(s0.valid);
        // Caller decides slot 0 stops retirement here; slot 1 is left in place.
        assert_eq!(rob.len(), 1);
    }

    #[test]
    fn a_lone_entry_retires_against_a_bubble() {
        let mut rob = Rob::try_new(4).unwrap();
        let t0 = rob.allocate(0x1000, 0x1004, 1).unwrap();
        rob.complete(t0, ExecuteResult::default());

        assert!(rob.head_ready());
        let s0 = rob.pop_slot0();
        assert!(s0.valid);
        assert!(rob.pop_slot1().is_none());
        assert!(rob.is_empty());
    }

    #[test]
    fn flush_after_drops_younger_rows() {
        let mut rob = Rob::try_new(8).unwrap();
        let t0 = rob.allocate(0x1000, 0x1004, 1).unwrap();
        rob.allocate(0x1004, 0x1008, 2).unwrap();
        rob.allocate(0x1008, 0x100c, 3).unwrap();
        assert_eq!(rob.len(), 3);

        rob.flush_after(t0);
        assert_eq!(rob.len(), 1);
    }

    #[test]
    fn flush_all_empties_the_rob() {
        let mut rob = Rob::try_new(4).unwrap();
        rob.allocate(0x1000, 0x1004, 1).unwrap();
        rob.allocate(0x1004, 0x1008, 2).unwrap();
        rob.flush_all();
        assert!(rob.is_empty());
    }
}
