//! The payload the backend's functional units hand to retirement, and the
//! cross-stage handle types used to address it.

use crate::common::error::Trap;

/// Opaque handle to a reorder-buffer slot, returned by [`crate::retirement::rob::Rob::allocate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RobTag(pub u32);

/// Opaque handle to a store-queue slot, returned by
/// [`crate::retirement::store_queue::StoreQueue::allocate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StoreReceipt(pub u32);

/// Everything a functional unit (the memory pipeline, or an out-of-scope ALU)
/// computes about one instruction, handed to retirement unmodified.
///
/// Carries both the "normal" result and every possible side-effect
/// disposition (CSR write, xRET, recovery-triggering branch outcome, cache
/// fences, atomics) because retirement — not the functional unit — is the
/// sole authority deciding which of these actually takes effect (spec.md
/// §4.5's priority-ranked disposition).
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecuteResult {
    /// Architectural result word written to `rd`.
    pub result: u64,
    /// Resolved branch/jump target, valid only when the instruction is a
    /// branch or jump.
    pub branch_target: u64,
    /// Whether a branch/jump was resolved taken.
    pub branch_taken: bool,
    /// Precise exception detected anywhere upstream of retirement.
    pub exception: Option<Trap>,
    /// Whether this instruction writes a CSR.
    pub write_csr: bool,
    /// CSR address, valid only when `write_csr`.
    pub csr_addr: u16,
    /// CSR write data, valid only when `write_csr`.
    pub csr_data: u64,
    /// Whether this is an xRET (serializing return-from-trap) instruction.
    pub xret: bool,
    /// Request a D-cache flush at retirement (FENCE/FENCE.I family).
    pub flush_dcache: bool,
    /// Request an I-cache flush at retirement (FENCE.I).
    pub flush_icache: bool,
    /// Request a TLB flush at retirement (SFENCE.VMA).
    pub flush_tlb: bool,
    /// Whether this instruction is a store-conditional.
    pub sc: bool,
    /// Whether this instruction is a load-reserved.
    pub lr: bool,
    /// Address the load-reservation should be set to, valid only when `lr`.
    pub lr_address: u64,
    /// Whether this instruction wrote the memory hierarchy (store or AMO).
    pub write: bool,
    /// Store-queue receipts this instruction allocated: one for a byte/half/
    /// word store or AMO, two (low beat first) for a 64-bit store.
    pub store_receipts: [Option<StoreReceipt>; 2],
}

/// One slot of the two-wide reorder buffer, as retirement observes it.
///
/// Mirrors spec.md §3's `ROB Retire Entry` exactly: `valid` and `commit` are
/// the readiness gate, `pc`/`spec`/`rd` are the bookkeeping retirement needs
/// to apply side effects, and `execute_result` is the functional unit's
/// output once the entry has been completed by its functional unit (here:
/// `commit == true`).
#[derive(Clone, Copy, Debug, Default)]
pub struct RobRetireEntry {
    /// Whether this slot holds a real instruction (`false` is a bubble).
    pub valid: bool,
    /// Whether the functional unit has produced a result for this slot.
    pub commit: bool,
    /// Architectural PC of the instruction.
    pub pc: u64,
    /// Speculative next-PC predicted at decode/rename.
    pub spec: u64,
    /// Destination architectural register.
    pub rd: u8,
    /// The functional unit's output, valid once `commit` is set.
    pub execute_result: ExecuteResult,
}
