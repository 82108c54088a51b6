//! Execute Queue (reservation station): shared entry/broadcast types for
//! the in-order and out-of-order variants (spec.md §4.3). Both share an
//! enqueue port, a fireable-entry dequeue port, a data-broadcast input,
//! and a recovery input.

pub mod inorder;
pub mod outoforder;

pub use inorder::InOrderQueue;
pub use outoforder::OutOfOrderQueue;

use crate::execute_result::RobTag;

/// A single source operand: either already resolved, or waiting on a
/// broadcast carrying its producer's ROB tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperandSlot {
    pub pending: bool,
    pub tag: RobTag,
    pub value: u64,
}

impl OperandSlot {
    /// An operand that never needed to wait (an immediate, or `x0`).
    #[must_use]
    pub fn ready(value: u64) -> Self {
        Self {
            pending: false,
            tag: RobTag::default(),
            value,
        }
    }

    /// An operand waiting on `tag`'s broadcast.
    #[must_use]
    pub fn waiting(tag: RobTag) -> Self {
        Self {
            pending: true,
            tag,
            value: 0,
        }
    }

    fn resolve(&mut self, broadcast: Broadcast) {
        if self.pending && self.tag == broadcast.tag {
            self.value = broadcast.value;
            self.pending = false;
        }
    }

    #[must_use]
    fn is_ready(&self) -> bool {
        !self.pending
    }
}

/// One data-broadcast, `{tag, value}`, fanned out combinationally to every
/// reservation-station entry in the same cycle it fires (spec.md §4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Broadcast {
    pub tag: RobTag,
    pub value: u64,
}

/// A reservation-station entry: an issued instruction waiting on up to
/// three source operands, tagged by the ROB slot it will complete.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecuteEntry {
    pub valid: bool,
    pub rob_tag: RobTag,
    pub rs1: OperandSlot,
    pub rs2: OperandSlot,
    /// Third operand, for the instruction subclasses that need one
    /// (spec.md §4.3 "optionally rs3"); `None` for everything else.
    pub rs3: Option<OperandSlot>,
}

impl ExecuteEntry {
    #[must_use]
    pub fn bubble() -> Self {
        Self::default()
    }

    fn resolve(&mut self, broadcast: Broadcast) {
        self.rs1.resolve(broadcast);
        self.rs2.resolve(broadcast);
        if let Some(rs3) = &mut self.rs3 {
            rs3.resolve(broadcast);
        }
    }

    /// An entry fires when every pending operand has resolved, or it's a
    /// bubble to begin with (spec.md §4.3's operand-readiness rule).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.valid
            || (self.rs1.is_ready()
                && self.rs2.is_ready()
                && self.rs3.as_ref().map_or(true, OperandSlot::is_ready))
    }
}
