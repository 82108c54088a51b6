//! Out-of-order execute queue: a chain of `depth` two-entry "double-buffer"
//! cells (spec.md §4.3). New instructions enter at cell 0 (the head,
//! youngest position); entries age down the chain toward the tail over
//! successive cycles. Arbitration runs tail-to-head so the oldest ready
//! entry always wins the single fire port, maximizing downstream wake-ups.

use super::{Broadcast, ExecuteEntry};
use crate::common::error::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum CellState {
    #[default]
    Empty,
    One,
    Two,
}

/// One double-buffer cell: `data` is the elder of its up-to-two resident
/// entries, `shadow` the younger.
#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    state: CellState,
    data: ExecuteEntry,
    shadow: ExecuteEntry,
}

impl Cell {
    fn has_room(&self) -> bool {
        self.state != CellState::Two
    }

    fn active_entry(&self) -> Option<&ExecuteEntry> {
        match self.state {
            CellState::Empty => None,
            CellState::One | CellState::Two => Some(&self.data),
        }
    }

    fn resolve(&mut self, broadcast: Broadcast) {
        match self.state {
            CellState::Empty => {}
            CellState::One => self.data.resolve(broadcast),
            CellState::Two => {
                self.data.resolve(broadcast);
                self.shadow.resolve(broadcast);
            }
        }
    }

    fn push(&mut self, entry: ExecuteEntry) {
        match self.state {
            CellState::Empty => {
                self.data = entry;
                self.state = CellState::One;
            }
            CellState::One => {
                self.shadow = entry;
                self.state = CellState::Two;
            }
            CellState::Two => unreachable!("push only called when the cell has room"),
        }
    }

    /// Fires `data`, promoting the shadow into its place if one was
    /// present (spec.md §4.3: "on dequeue-fire from state two, shadow →
    /// data").
    fn fire(&mut self) -> ExecuteEntry {
        let fired = self.data;
        match self.state {
            CellState::Two => {
                self.data = self.shadow;
                self.state = CellState::One;
            }
            _ => {
                self.state = CellState::Empty;
                self.data = ExecuteEntry::default();
            }
        }
        fired
    }
}

/// Chain of `depth` double-buffer cells.
#[derive(Debug)]
pub struct OutOfOrderQueue {
    cells: Vec<Cell>,
}

impl OutOfOrderQueue {
    pub fn try_new(depth: usize) -> Result<Self, ConfigError> {
        if depth == 0 {
            return Err(ConfigError::ZeroDepth("out-of-order execute queue"));
        }
        Ok(Self {
            cells: vec![Cell::default(); depth],
        })
    }

    /// True when cell 0 — the only cell new entries enter — has no room.
    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.cells[0].has_room()
    }

    /// Enqueues at cell 0. Returns `None` if cell 0 is already full.
    pub fn enqueue(&mut self, entry: ExecuteEntry) -> Option<()> {
        if self.is_full() {
            return None;
        }
        self.cells[0].push(entry);
        Some(())
    }

    /// Fans a broadcast out to every occupied register in every cell.
    pub fn broadcast(&mut self, broadcast: Broadcast) {
        for cell in &mut self.cells {
            cell.resolve(broadcast);
        }
    }

    /// Arbitrates tail-to-head and fires the oldest ready entry, if any.
    pub fn dequeue(&mut self) -> Option<ExecuteEntry> {
        let winner = self
            .cells
            .iter()
            .enumerate()
            .rev()
            .find(|(_, cell)| cell.active_entry().is_some_and(ExecuteEntry::is_ready))
            .map(|(idx, _)| idx)?;
        Some(self.cells[winner].fire())
    }

    /// Advances the chain one hop: any cell holding two entries pushes its
    /// elder (`data`) entry into the next cell toward the tail if that
    /// cell has room, so entries keep aging down the chain even on cycles
    /// where nothing fires.
    pub fn advance(&mut self) {
        for i in 0..self.cells.len().saturating_sub(1) {
            if self.cells[i].state == CellState::Two && self.cells[i + 1].has_room() {
                let moving = self.cells[i].data;
                self.cells[i + 1].push(moving);
                self.cells[i].data = self.cells[i].shadow;
                self.cells[i].state = CellState::One;
            }
        }
    }

    /// Invalidates every occupied register in place; each drains as a
    /// bubble the next time it's the arbitration winner.
    pub fn recover(&mut self) {
        for cell in &mut self.cells {
            match cell.state {
                CellState::Empty => {}
                CellState::One => cell.data.valid = false,
                CellState::Two => {
                    cell.data.valid = false;
                    cell.shadow.valid = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute_queue::OperandSlot;
    use crate::execute_result::RobTag;

    fn ready_entry(tag: RobTag) -> ExecuteEntry {
        ExecuteEntry {
            valid: true,
            rob_tag: tag,
            rs1: OperandSlot::ready(0),
            rs2: OperandSlot::ready(0),
            rs3: None,
        }
    }

    fn waiting_entry(tag: RobTag) -> ExecuteEntry {
        ExecuteEntry {
            valid: true,
            rob_tag: tag,
            rs1: OperandSlot::waiting(tag),
            rs2: OperandSlot::ready(0),
            rs3: None,
        }
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert!(matches!(
            OutOfOrderQueue::try_new(0),
            Err(ConfigError::ZeroDepth("out-of-order execute queue"))
        ));
    }

    #[test]
    fn a_just_enqueued_entry_can_fire_the_same_cycle() {
        let mut q = OutOfOrderQueue::try_new(4).unwrap();
        q.enqueue(waiting_entry(RobTag(1))).unwrap();
        q.broadcast(Broadcast {
            tag: RobTag(1),
            value: 7,
        });
        let out = q.dequeue().unwrap();
        assert_eq!(out.rs1.value, 7);
    }

    #[test]
    fn second_enqueue_into_same_cell_occupies_the_shadow() {
        let mut q = OutOfOrderQueue::try_new(4).unwrap();
        q.enqueue(ready_entry(RobTag(1))).unwrap();
        q.enqueue(waiting_entry(RobTag(2))).unwrap();
        assert!(q.is_full());
    }

    #[test]
    fn arbitration_favors_the_oldest_ready_entry() {
        let mut q = OutOfOrderQueue::try_new(4).unwrap();
        q.enqueue(ready_entry(RobTag(1))).unwrap();
        q.advance();
        q.enqueue(ready_entry(RobTag(2))).unwrap();
        // RobTag(1) has aged into cell 1 (the tail direction), RobTag(2)
        // sits in cell 0; arbitration must prefer the older one.
        let out = q.dequeue().unwrap();
        assert_eq!(out.rob_tag, RobTag(1));
    }

    #[test]
    fn recover_lets_an_entry_drain_as_a_bubble() {
        let mut q = OutOfOrderQueue::try_new(4).unwrap();
        q.enqueue(waiting_entry(RobTag(1))).unwrap();
        q.recover();
        let out = q.dequeue().unwrap();
        assert!(!out.valid);
    }

    #[test]
    fn advance_moves_the_elder_entry_toward_the_tail() {
        let mut q = OutOfOrderQueue::try_new(4).unwrap();
        q.enqueue(ready_entry(RobTag(1))).unwrap();
        q.enqueue(ready_entry(RobTag(2))).unwrap();
        assert!(q.is_full());
        q.advance();
        assert!(!q.is_full(), "aging the elder entry out should free cell 0");
    }
}
