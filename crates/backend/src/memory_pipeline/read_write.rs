//! Memory Pipeline ReadWrite stage: the 5-state FSM that performs the
//! actual load/store/AMO/LR-SC and formats the architectural result
//! (spec.md §4.2). By line share this is the largest single stage in the
//! backend.

use crate::common::addr::PhysAddr;
use crate::common::error::Trap;
use crate::execute_result::{ExecuteResult, RobTag, StoreReceipt};
use crate::load_reservation::LoadReservationTracker;
use crate::memory_pipeline::decode::MemOp;
use crate::memory_pipeline::tlb::MemTlbEntry;
use crate::retirement::store_queue::{StoreQueue, WriteWidth};

/// The SMA read port as the ReadWrite stage sees it: always a 4-byte,
/// word-aligned transaction (spec.md §6.2). Sub-word loads extract their
/// bytes locally from the returned word, matching the byte-bypass window's
/// own 4-byte granularity.
pub trait SmaReadPort {
    fn request(&mut self, paddr: PhysAddr);
    /// `None` while the transaction is still outstanding.
    fn poll(&mut self) -> Option<([u8; 4], Option<Trap>)>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum RwState {
    #[default]
    Idle,
    ReadBottom,
    ReadTop,
    WriteBottom,
    WriteTop,
}

#[derive(Clone, Copy, Debug, Default)]
struct InFlight {
    pc: u64,
    spec: u64,
    rd: u8,
    rob_tag: RobTag,
    op: Option<MemOp>,
    /// Store/AMO write data; overwritten with the ALU result for an AMO
    /// once its read beat completes.
    op1: u64,
    paddr: PhysAddr,
    /// Holds the low read/write beat's value (`Ld`'s bottom word, or the
    /// AMO's pre-value to return, or the low beat's receipt for `Sd`).
    low: u32,
}

/// Output of a completed ReadWrite cycle, ready for `Rob::complete`.
#[derive(Clone, Copy, Debug)]
pub struct ReadWriteResult {
    pub rob_tag: RobTag,
    pub execute_result: ExecuteResult,
}

fn word_align(addr: PhysAddr) -> PhysAddr {
    PhysAddr(addr.val() & !0b11)
}

fn byte_offset(addr: PhysAddr) -> usize {
    (addr.val() & 0b11) as usize
}

/// Extracts and sign/zero-extends the architectural result for a load from
/// its fetched word.
fn format_load(op: MemOp, word: [u8; 4], offset: usize) -> u64 {
    match op {
        MemOp::Lb => i64::from(word[offset] as i8) as u64,
        MemOp::Lbu => u64::from(word[offset]),
        MemOp::Lh => {
            let bytes = [word[offset], word[offset + 1]];
            i64::from(i16::from_le_bytes(bytes)) as u64
        }
        MemOp::Lhu => {
            let bytes = [word[offset], word[offset + 1]];
            u64::from(u16::from_le_bytes(bytes))
        }
        _ => {
            let v = u32::from_le_bytes(word);
            i64::from(v as i32) as u64
        }
    }
}

/// The explicit 4-entry sign table for AMO min/max (spec.md §9's design
/// note: clearer than a generic signed comparison and faithful to the
/// hardware's intent).
fn amo_min_max(op: MemOp, mem_val: u32, reg_val: u32) -> u32 {
    let mem_lt_reg = match ((mem_val as i32) < 0, (reg_val as i32) < 0) {
        (false, false) => mem_val < reg_val,
        (true, true) => (mem_val as i32) < (reg_val as i32),
        (true, false) => true,
        (false, true) => false,
    };
    let mem_wins = matches!(op, MemOp::AmoMin) == mem_lt_reg;
    if mem_wins {
        mem_val
    } else {
        reg_val
    }
}

/// Computes the AMO ALU combinator on `(mem_val, reg_val)` (spec.md §4.2).
fn amo_alu(op: MemOp, mem_val: u32, reg_val: u32) -> u32 {
    match op {
        MemOp::AmoSwap => reg_val,
        MemOp::AmoAdd => mem_val.wrapping_add(reg_val),
        MemOp::AmoXor => mem_val ^ reg_val,
        MemOp::AmoAnd => mem_val & reg_val,
        MemOp::AmoOr => mem_val | reg_val,
        MemOp::AmoMin | MemOp::AmoMax => amo_min_max(op, mem_val, reg_val),
        MemOp::AmoMinu => mem_val.min(reg_val),
        MemOp::AmoMaxu => mem_val.max(reg_val),
        _ => unreachable!("amo_alu only called for AMO ops"),
    }
}

/// Masks a byte/half/word store's data down to its natural width.
fn store_payload(op: MemOp, op1: u64) -> (WriteWidth, u32) {
    match op {
        MemOp::Sb => (WriteWidth::Byte, u32::from(op1 as u8)),
        MemOp::Sh => (WriteWidth::Half, u32::from(op1 as u16)),
        _ => (WriteWidth::Word, op1 as u32),
    }
}

/// The ReadWrite stage's 5-state FSM.
#[derive(Debug, Default)]
pub struct ReadWriteStage {
    state: RwState,
    entry: InFlight,
}

impl ReadWriteStage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the stage by one cycle. On `recover`, a write-state entry
    /// snaps straight to idle so it never allocates a store-queue receipt
    /// (spec.md §4.2/§8's recovery-discards-speculative-stores rule); a
    /// read in flight is simply left to finish and its result discarded by
    /// the caller, since a load has no side effect to undo.
    pub fn step(
        &mut self,
        incoming: MemTlbEntry,
        recover: bool,
        sma: &mut impl SmaReadPort,
        store_queue: &mut StoreQueue,
        reservations: &mut LoadReservationTracker,
    ) -> Option<ReadWriteResult> {
        if recover && matches!(self.state, RwState::WriteBottom | RwState::WriteTop) {
            self.state = RwState::Idle;
            return None;
        }

        match self.state {
            RwState::Idle => self.start(incoming, sma, reservations),
            RwState::ReadBottom => self.read_bottom(sma),
            RwState::ReadTop => self.read_top(sma),
            RwState::WriteBottom => self.write_bottom(store_queue),
            RwState::WriteTop => self.write_top(store_queue),
        }
    }

    fn start(
        &mut self,
        incoming: MemTlbEntry,
        sma: &mut impl SmaReadPort,
        reservations: &mut LoadReservationTracker,
    ) -> Option<ReadWriteResult> {
        if !incoming.valid {
            return None;
        }

        if let Some(memory_error) = incoming.error {
            let is_write = incoming.op.is_some_and(MemOp::is_write);
            return Some(Self::exception(
                incoming.rob_tag,
                memory_error.into_trap(incoming.paddr.val(), is_write),
            ));
        }

        let Some(op) = incoming.op else {
            return Some(Self::exception(incoming.rob_tag, Trap::IllegalInstruction));
        };

        self.entry = InFlight {
            pc: incoming.pc,
            spec: incoming.spec,
            rd: incoming.rd,
            rob_tag: incoming.rob_tag,
            op: Some(op),
            op1: incoming.op1,
            paddr: incoming.paddr,
            low: 0,
        };

        match op {
            MemOp::Sc => {
                let success = reservations.check_sc(incoming.paddr);
                reservations.execute_sc();
                if success {
                    self.state = RwState::WriteBottom;
                    None
                } else {
                    Some(ReadWriteResult {
                        rob_tag: incoming.rob_tag,
                        execute_result: ExecuteResult {
                            result: 1,
                            branch_target: incoming.spec,
                            sc: true,
                            ..Default::default()
                        },
                    })
                }
            }
            MemOp::Sb | MemOp::Sh | MemOp::Sw | MemOp::Sd => {
                self.state = RwState::WriteBottom;
                None
            }
            _ => {
                sma.request(word_align(incoming.paddr));
                self.state = RwState::ReadBottom;
                None
            }
        }
    }

    fn read_bottom(&mut self, sma: &mut impl SmaReadPort) -> Option<ReadWriteResult> {
        let (word, error) = sma.poll()?;
        if let Some(trap) = error {
            self.state = RwState::Idle;
            return Some(Self::exception(self.entry.rob_tag, trap));
        }

        let Some(op) = self.entry.op else {
            unreachable!("ReadBottom only reached with an op")
        };
        let offset = byte_offset(self.entry.paddr);
        let bottom = u32::from_le_bytes(word);

        match op {
            MemOp::Ld => {
                self.entry.low = bottom;
                sma.request(PhysAddr(word_align(self.entry.paddr).val() + 4));
                self.state = RwState::ReadTop;
                None
            }
            MemOp::Lr => {
                self.state = RwState::Idle;
                let tag = self.entry.rob_tag;
                Some(ReadWriteResult {
                    rob_tag: tag,
                    execute_result: ExecuteResult {
                        result: format_load(op, word, offset),
                        branch_target: self.entry.spec,
                        lr: true,
                        lr_address: self.entry.paddr.val(),
                        ..Default::default()
                    },
                })
            }
            _ if op.is_amo() => {
                self.entry.low = bottom;
                let new_val = amo_alu(op, bottom, self.entry.op1 as u32);
                self.entry.op1 = u64::from(new_val);
                self.state = RwState::WriteBottom;
                None
            }
            _ => {
                self.state = RwState::Idle;
                let tag = self.entry.rob_tag;
                Some(ReadWriteResult {
                    rob_tag: tag,
                    execute_result: ExecuteResult {
                        result: format_load(op, word, offset),
                        branch_target: self.entry.spec,
                        ..Default::default()
                    },
                })
            }
        }
    }

    fn read_top(&mut self, sma: &mut impl SmaReadPort) -> Option<ReadWriteResult> {
        let (word, error) = sma.poll()?;
        self.state = RwState::Idle;
        let tag = self.entry.rob_tag;
        if let Some(trap) = error {
            return Some(Self::exception(tag, trap));
        }
        let top = u64::from(u32::from_le_bytes(word));
        let result = (top << 32) | u64::from(self.entry.low);
        Some(ReadWriteResult {
            rob_tag: tag,
            execute_result: ExecuteResult {
                result,
                branch_target: self.entry.spec,
                ..Default::default()
            },
        })
    }

    fn write_bottom(&mut self, store_queue: &mut StoreQueue) -> Option<ReadWriteResult> {
        let Some(op) = self.entry.op else {
            unreachable!("WriteBottom only reached with an op")
        };

        let (width, data) = match op {
            MemOp::Sd | MemOp::Sc => (WriteWidth::Word, self.entry.op1 as u32),
            _ if op.is_amo() => (WriteWidth::Word, self.entry.op1 as u32),
            _ => store_payload(op, self.entry.op1),
        };

        let receipt = store_queue.allocate(width, self.entry.paddr, data)?;

        if op == MemOp::Sd {
            self.entry.low = receipt.0;
            self.state = RwState::WriteTop;
            return None;
        }

        self.state = RwState::Idle;
        let tag = self.entry.rob_tag;
        let result = if op.is_amo() {
            i64::from(self.entry.low as i32) as u64
        } else {
            0
        };
        Some(ReadWriteResult {
            rob_tag: tag,
            execute_result: ExecuteResult {
                result,
                branch_target: self.entry.spec,
                write: true,
                sc: op == MemOp::Sc,
                store_receipts: [Some(receipt), None],
                ..Default::default()
            },
        })
    }

    fn write_top(&mut self, store_queue: &mut StoreQueue) -> Option<ReadWriteResult> {
        let high = (self.entry.op1 >> 32) as u32;
        let paddr = PhysAddr(self.entry.paddr.val() + 4);
        let receipt_high = store_queue.allocate(WriteWidth::Word, paddr, high)?;

        self.state = RwState::Idle;
        let tag = self.entry.rob_tag;
        Some(ReadWriteResult {
            rob_tag: tag,
            execute_result: ExecuteResult {
                result: 0,
                branch_target: self.entry.spec,
                write: true,
                store_receipts: [Some(StoreReceipt(self.entry.low)), Some(receipt_high)],
                ..Default::default()
            },
        })
    }

    fn exception(rob_tag: RobTag, trap: Trap) -> ReadWriteResult {
        ReadWriteResult {
            rob_tag,
            execute_result: ExecuteResult {
                exception: Some(trap),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_pipeline::decode::{InstKind, MemDecodeEntry};
    use crate::memory_pipeline::execute::execute;

    struct FakeSma {
        answer: Option<([u8; 4], Option<Trap>)>,
        requests: Vec<PhysAddr>,
    }

    impl FakeSma {
        fn new() -> Self {
            Self {
                answer: None,
                requests: Vec::new(),
            }
        }
    }

    impl SmaReadPort for FakeSma {
        fn request(&mut self, paddr: PhysAddr) {
            self.requests.push(paddr);
        }

        fn poll(&mut self) -> Option<([u8; 4], Option<Trap>)> {
            self.answer
        }
    }

    fn tlb_entry_for(op_kind: InstKind, func3: u8, rs1: u64, imm: i64, rs2: u64) -> MemTlbEntry {
        let decode = MemDecodeEntry::imm_addressed(
            op_kind,
            func3,
            0x1000,
            0x1004,
            1,
            RobTag(7),
            rs1,
            imm,
            rs2,
        );
        let ex = execute(decode);
        MemTlbEntry {
            valid: ex.valid,
            pc: ex.pc,
            spec: ex.spec,
            rd: ex.rd,
            rob_tag: ex.rob_tag,
            op: ex.op,
            op1: ex.op1,
            paddr: PhysAddr(ex.vaddress.val()),
            error: ex.error,
        }
    }

    #[test]
    fn ld_concatenates_two_beats() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        let entry = tlb_entry_for(InstKind::I, 0b011, 0x8000_0000, 0, 0);
        assert!(stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .is_none());
        assert_eq!(sma.requests, vec![PhysAddr(0x8000_0000)]);

        sma.answer = Some((0x1122_3344u32.to_le_bytes(), None));
        assert!(stage
            .step(
                MemTlbEntry::default(),
                false,
                &mut sma,
                &mut store_queue,
                &mut reservations
            )
            .is_none());
        assert_eq!(sma.requests, vec![PhysAddr(0x8000_0000), PhysAddr(0x8000_0004)]);

        sma.answer = Some((0x5566_7788u32.to_le_bytes(), None));
        let out = stage
            .step(
                MemTlbEntry::default(),
                false,
                &mut sma,
                &mut store_queue,
                &mut reservations,
            )
            .unwrap();
        assert_eq!(out.execute_result.result, 0x5566_7788_1122_3344);
    }

    #[test]
    fn sc_fails_with_no_prior_reservation() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        let mut entry = tlb_entry_for(InstKind::R, 0, 0x8000_0000, 0, 0xAB);
        entry.op = Some(MemOp::Sc);

        let out = stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .unwrap();
        assert_eq!(out.execute_result.result, 1);
        assert!(!out.execute_result.write);
        assert_eq!(store_queue.len(), 0);
    }

    #[test]
    fn sc_succeeds_against_a_matching_reservation() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();
        reservations.execute_lr(PhysAddr(0x8000_0000));

        let mut entry = tlb_entry_for(InstKind::R, 0, 0x8000_0000, 0, 0xAB);
        entry.op = Some(MemOp::Sc);

        assert!(stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .is_none());
        let out = stage
            .step(
                MemTlbEntry::default(),
                false,
                &mut sma,
                &mut store_queue,
                &mut reservations,
            )
            .unwrap();
        assert_eq!(out.execute_result.result, 0);
        assert!(out.execute_result.write);
        assert_eq!(store_queue.len(), 1);
    }

    #[test]
    fn amo_add_returns_pre_value_and_writes_sum() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        let mut entry = tlb_entry_for(InstKind::R, 0, 0x8000_0000, 0, 5);
        entry.op = Some(MemOp::AmoAdd);

        assert!(stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .is_none());

        sma.answer = Some((10u32.to_le_bytes(), None));
        assert!(stage
            .step(
                MemTlbEntry::default(),
                false,
                &mut sma,
                &mut store_queue,
                &mut reservations
            )
            .is_none());

        let out = stage
            .step(
                MemTlbEntry::default(),
                false,
                &mut sma,
                &mut store_queue,
                &mut reservations,
            )
            .unwrap();
        assert_eq!(out.execute_result.result, 10, "AMO returns the pre-value");
        assert_eq!(store_queue.len(), 1);
    }

    #[test]
    fn plain_store_never_touches_the_sma_read_port() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        let entry = tlb_entry_for(InstKind::S, 0b010, 0x8000_0000, 0, 0x1234);
        let out = stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .unwrap();
        assert!(sma.requests.is_empty());
        assert!(out.execute_result.write);
        assert_eq!(store_queue.len(), 1);
    }

    #[test]
    fn recover_snaps_a_speculative_store_to_idle() {
        let mut stage = ReadWriteStage::new();
        let mut sma = FakeSma::new();
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        // Fill the queue so the store's allocation handshake stalls in
        // WriteBottom, leaving recovery something to discard.
        for _ in 0..4 {
            store_queue.allocate(WriteWidth::Word, PhysAddr(0), 0).unwrap();
        }

        let entry = tlb_entry_for(InstKind::S, 0b010, 0x8000_0000, 0, 0x1234);
        assert!(stage
            .step(entry, false, &mut sma, &mut store_queue, &mut reservations)
            .is_none());

        let out = stage.step(
            MemTlbEntry::default(),
            true,
            &mut sma,
            &mut store_queue,
            &mut reservations,
        );
        assert!(out.is_none());
        assert_eq!(store_queue.len(), 4, "no new receipt should ever be allocated");
    }
}
