//! Memory Pipeline TLB stage: an idle/waiting handshake with the external
//! DTLB port (spec.md §4.2). The DTLB itself — page-table walking, the TLB
//! array — is an out-of-scope collaborator; this stage only owns the
//! request/response handshake and the recovery-survives-in-flight-request
//! rule.

use crate::common::addr::{PhysAddr, VirtAddr};
use crate::common::error::MemoryErrorCode;
use crate::execute_result::RobTag;
use crate::memory_pipeline::decode::MemOp;
use crate::memory_pipeline::execute::MemExecuteEntry;

/// The external DTLB's decoupled handshake.
pub trait TlbPort {
    /// Issues a translation request for `vaddress`. `write` selects the
    /// access-type input to the page-table permission check.
    fn request(&mut self, vaddress: VirtAddr, write: bool);
    /// Polls for the DTLB's answer; `None` means still translating.
    fn poll(&mut self) -> Option<(PhysAddr, Option<MemoryErrorCode>)>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TlbState {
    #[default]
    Idle,
    Waiting,
}

/// The TLB stage's register entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemTlbEntry {
    pub valid: bool,
    pub pc: u64,
    pub spec: u64,
    pub rd: u8,
    pub rob_tag: RobTag,
    pub op: Option<MemOp>,
    pub op1: u64,
    pub paddr: PhysAddr,
    pub error: Option<MemoryErrorCode>,
}

/// Idle/waiting FSM around the DTLB handshake.
#[derive(Debug, Default)]
pub struct TlbStage {
    state: TlbState,
    entry: MemExecuteEntry,
}

impl TlbStage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the stage by one cycle. `recover` marks any in-flight entry
    /// invalid without aborting a live DTLB request — the request must
    /// complete to preserve the DTLB's own internal state.
    pub fn step(
        &mut self,
        incoming: MemExecuteEntry,
        recover: bool,
        port: &mut impl TlbPort,
    ) -> Option<MemTlbEntry> {
        match self.state {
            TlbState::Idle => {
                if !incoming.valid {
                    return Some(MemTlbEntry::default());
                }
                if incoming.error.is_some() {
                    // A pre-existing misalignment dominates; skip the DTLB
                    // request entirely.
                    return Some(MemTlbEntry {
                        valid: !recover,
                        pc: incoming.pc,
                        spec: incoming.spec,
                        rd: incoming.rd,
                        rob_tag: incoming.rob_tag,
                        op: incoming.op,
                        op1: incoming.op1,
                        paddr: PhysAddr(0),
                        error: incoming.error,
                    });
                }
                let write = incoming.op.is_some_and(MemOp::is_write);
                port.request(incoming.vaddress, write);
                self.entry = incoming;
                self.entry.valid = self.entry.valid && !recover;
                self.state = TlbState::Waiting;
                None
            }
            TlbState::Waiting => {
                if recover {
                    self.entry.valid = false;
                }
                let (paddr, tlb_error) = port.poll()?;
                self.state = TlbState::Idle;
                let entry = self.entry;
                Some(MemTlbEntry {
                    valid: entry.valid,
                    pc: entry.pc,
                    spec: entry.spec,
                    rd: entry.rd,
                    rob_tag: entry.rob_tag,
                    op: entry.op,
                    op1: entry.op1,
                    paddr,
                    error: entry.error.or(tlb_error),
                })
            }
        }
    }
}
