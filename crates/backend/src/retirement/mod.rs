//! Retirement Engine: the program-order commit stage that drains the ROB
//! two entries at a time and is the sole authority over architectural state
//! (spec.md §4.5).

pub mod flush;
pub mod rob;
pub mod store_queue;

use tracing::trace;

use crate::common::error::Trap;
use crate::execute_result::{RobRetireEntry, RobTag};
use crate::load_reservation::LoadReservationTracker;
use flush::{FlushFsm, FlushRequest, FlushSink, FlushStep};
use rob::Rob;
use store_queue::StoreQueue;

/// Writes the retired result to the architectural register file.
pub trait ArchWriteback {
    fn write_register(&mut self, rd: u8, value: u64);
}

/// Applies a retired CSR write.
pub trait CsrSink {
    fn write_csr(&mut self, addr: u16, data: u64);
}

/// Trains the branch predictor on a resolved outcome.
pub trait BranchPredictorSink {
    fn update(&mut self, pc: u64, target: u64, taken: bool);
}

/// Resolves the handler entry PC for a precise exception or an xRET.
pub trait TrapSink {
    fn exception_handler_pc(&mut self, faulting_pc: u64, trap: Trap) -> u64;
    fn xret_handler_pc(&mut self, pc: u64) -> u64;
}

/// What retirement asserts this cycle: either nothing, or a `recover` pulse
/// redirecting fetch to `correct_pc`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Recovery {
    pub pulse: bool,
    pub correct_pc: u64,
}

impl Recovery {
    fn redirect(correct_pc: u64) -> Self {
        Self {
            pulse: true,
            correct_pc,
        }
    }
}

/// Running totals the retirement port accumulates, surfaced for
/// observability (not an architectural requirement of spec.md, but the
/// kind of bookkeeping the embedding simulator keeps at every commit port).
#[derive(Clone, Copy, Debug, Default)]
pub struct RetireStats {
    pub instructions_retired: u64,
    pub recoveries: u64,
    pub exceptions: u64,
    pub mispredicts: u64,
    pub xrets: u64,
    pub flushes: u64,
}

/// Two-wide, program-order commit engine.
#[derive(Debug)]
pub struct RetirementEngine {
    rob: Rob,
    store_queue: StoreQueue,
    load_reservation: LoadReservationTracker,
    flush_fsm: FlushFsm,
    stats: RetireStats,
    /// `real` PC to resume at once the active flush sequence drains.
    flush_resume_pc: u64,
}

impl RetirementEngine {
    #[must_use]
    pub fn new(rob: Rob, store_queue: StoreQueue) -> Self {
        Self {
            rob,
            store_queue,
            load_reservation: LoadReservationTracker::new(),
            flush_fsm: FlushFsm::default(),
            stats: RetireStats::default(),
            flush_resume_pc: 0,
        }
    }

    #[must_use]
    pub fn rob(&self) -> &Rob {
        &self.rob
    }

    #[must_use]
    pub fn rob_mut(&mut self) -> &mut Rob {
        &mut self.rob
    }

    #[must_use]
    pub fn store_queue(&self) -> &StoreQueue {
        &self.store_queue
    }

    #[must_use]
    pub fn store_queue_mut(&mut self) -> &mut StoreQueue {
        &mut self.store_queue
    }

    #[must_use]
    pub fn load_reservation(&self) -> &LoadReservationTracker {
        &self.load_reservation
    }

    #[must_use]
    pub fn stats(&self) -> RetireStats {
        self.stats
    }

    /// Applies the global recover pulse's effect on retirement-owned state:
    /// everything younger than `keep_tag` is dropped, speculative stores are
    /// flushed, and the load-reservation speculative copy snaps back to the
    /// retirement-committed snapshot.
    pub fn recover(&mut self, keep_tag: RobTag) {
        self.rob.flush_after(keep_tag);
        self.store_queue.flush_speculative();
        self.load_reservation.recover();
    }

    /// Advances retirement by one cycle. Returns the recovery this cycle
    /// asserts, if any.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        regs: &mut impl ArchWriteback,
        csrs: &mut impl CsrSink,
        predictor: &mut impl BranchPredictorSink,
        traps: &mut impl TrapSink,
        dcache: &mut impl FlushSink,
        icache: &mut impl FlushSink,
        tlb: &mut impl FlushSink,
    ) -> Recovery {
        if self.flush_fsm.is_active() {
            return match self.flush_fsm.step(dcache, icache, tlb) {
                FlushStep::Waiting => Recovery::default(),
                FlushStep::Done { .. } => {
                    self.stats.flushes += 1;
                    Recovery::redirect(self.flush_resume_pc)
                }
            };
        }

        if !self.rob.head_ready() {
            return Recovery::default();
        }

        let slot0 = self.rob.pop_slot0();
        let (recovery, stop) = self.process_slot(0, slot0, regs, csrs, predictor, traps);
        if stop {
            return recovery;
        }

        let Some(slot1) = self.rob.pop_slot1() else {
            return recovery;
        };
        let (recovery, _stop) = self.process_slot(1, slot1, regs, csrs, predictor, traps);
        recovery
    }

    fn process_slot(
        &mut self,
        slot: u8,
        entry: RobRetireEntry,
        regs: &mut impl ArchWriteback,
        csrs: &mut impl CsrSink,
        predictor: &mut impl BranchPredictorSink,
        traps: &mut impl TrapSink,
    ) -> (Recovery, bool) {
        if !entry.valid {
            return (Recovery::default(), false);
        }

        let result = entry.execute_result;
        self.stats.instructions_retired += 1;

        // 1. Exception
        if let Some(trap) = result.exception {
            trace!(pc = entry.pc, ?trap, "retire: exception");
            self.stats.exceptions += 1;
            let handler_pc = traps.exception_handler_pc(entry.pc, trap);
            return (Recovery::redirect(handler_pc), true);
        }

        // 2. xRET
        if result.xret {
            trace!(pc = entry.pc, "retire: xret");
            self.stats.xrets += 1;
            let handler_pc = traps.xret_handler_pc(entry.pc);
            return (Recovery::redirect(handler_pc), true);
        }

        // 3. CSR write (serializing)
        if result.write_csr {
            trace!(pc = entry.pc, addr = result.csr_addr, "retire: csr write");
            csrs.write_csr(result.csr_addr, result.csr_data);
            if entry.rd != 0 {
                regs.write_register(entry.rd, result.result);
            }
            return (Recovery::redirect(result.branch_target), true);
        }

        // 4. Branch misprediction
        if entry.spec != result.branch_target {
            trace!(
                pc = entry.pc,
                spec = entry.spec,
                real = result.branch_target,
                "retire: branch mispredict"
            );
            self.stats.mispredicts += 1;
            if entry.rd != 0 {
                regs.write_register(entry.rd, result.result);
            }
            predictor.update(entry.pc, result.branch_target, result.branch_taken);
            return (Recovery::redirect(result.branch_target), true);
        }
        if result.branch_taken {
            predictor.update(entry.pc, result.branch_target, result.branch_taken);
        }

        // 5. Flush
        let flush_request = FlushRequest {
            dcache: result.flush_dcache,
            icache: result.flush_icache,
            tlb: result.flush_tlb,
        };
        if flush_request.any() {
            trace!(pc = entry.pc, ?flush_request, "retire: flush");
            if entry.rd != 0 {
                regs.write_register(entry.rd, result.result);
            }
            self.flush_resume_pc = result.branch_target;
            self.flush_fsm.enter(flush_request, slot);
            return (Recovery::default(), true);
        }

        // 6. Normal
        trace!(pc = entry.pc, "retire: normal");
        if entry.rd != 0 {
            regs.write_register(entry.rd, result.result);
        }
        if result.lr {
            self.load_reservation
                .retire_lr(crate::common::addr::PhysAddr(result.lr_address));
        }
        if result.sc {
            self.load_reservation.retire_sc();
        }
        for receipt in result.store_receipts.into_iter().flatten() {
            self.store_queue.commit(receipt);
        }

        (Recovery::default(), false)
    }
}
