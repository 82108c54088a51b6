//! Architectural exception taxonomy and construction-time configuration errors.
//!
//! This module draws the line spec.md §7 draws: `Trap` is the set of
//! precisely-delivered architectural exceptions the Retirement Engine hands
//! to the external trap handler, carried unchanged on in-flight entries from
//! the stage that first detected them. `ConfigError` is the unrelated
//! "internal misconfig" category — rejected once, at construction, never
//! seen by a running pipeline.

use thiserror::Error;

/// A RISC-V architectural exception, as taken precisely at retirement.
///
/// Limited to the codes the speculative execution backend can itself raise
/// (spec.md §6.4); instruction-fetch and privileged-instruction traps are
/// raised by out-of-scope collaborators (fetch/decode) and simply pass
/// through this pipeline unchanged on the entries that already carry them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Trap {
    /// Unknown/unsupported memory-operation encoding.
    #[error("illegal instruction")]
    IllegalInstruction,
    /// Load address was not naturally aligned to its access width.
    #[error("load address misaligned at {0:#x}")]
    LoadAddressMisaligned(u64),
    /// Store or AMO address was not naturally aligned to its access width.
    #[error("store/amo address misaligned at {0:#x}")]
    StoreAmoAddressMisaligned(u64),
    /// Load violated memory protection or targeted unbacked memory.
    #[error("load access fault at {0:#x}")]
    LoadAccessFault(u64),
    /// Store or AMO violated memory protection or targeted unbacked memory.
    #[error("store/amo access fault at {0:#x}")]
    StoreAmoAccessFault(u64),
    /// Load translation missed in the page tables.
    #[error("load page fault at {0:#x}")]
    LoadPageFault(u64),
    /// Store or AMO translation missed in the page tables.
    #[error("store/amo page fault at {0:#x}")]
    StoreAmoPageFault(u64),
}

/// The error classification carried on an in-flight memory-pipeline entry
/// before it is mapped to a concrete [`Trap`] at the ReadWrite stage.
///
/// Kept separate from `Trap` because the mapping to a concrete exception
/// code depends on whether the operation turns out to be a read or a
/// write/AMO (spec.md §6.4) — a fact not yet fully resolved when the
/// Execute or TLB stage first detects the problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryErrorCode {
    /// Address failed the width-based alignment check in Execute.
    Misaligned,
    /// DTLB reported a page-table miss.
    PageFault,
    /// DTLB or the SMA read port reported a protection/access violation.
    AccessFault,
}

impl MemoryErrorCode {
    /// Maps a staged error tag to its concrete [`Trap`], per spec.md §6.4.
    ///
    /// A pre-existing misalignment always dominates a later TLB error
    /// (spec.md §4.2); callers enforce that by only ever tagging the first
    /// error observed and never overwriting it, so this function does not
    /// need to arbitrate priority itself.
    #[must_use]
    pub fn into_trap(self, addr: u64, is_write: bool) -> Trap {
        match (self, is_write) {
            (Self::Misaligned, false) => Trap::LoadAddressMisaligned(addr),
            (Self::Misaligned, true) => Trap::StoreAmoAddressMisaligned(addr),
            (Self::PageFault, false) => Trap::LoadPageFault(addr),
            (Self::PageFault, true) => Trap::StoreAmoPageFault(addr),
            (Self::AccessFault, false) => Trap::LoadAccessFault(addr),
            (Self::AccessFault, true) => Trap::StoreAmoAccessFault(addr),
        }
    }
}

/// Rejected at construction time — never produced by a running pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A queue/buffer was asked to be built with zero capacity.
    #[error("{0} depth must be at least 1")]
    ZeroDepth(&'static str),
    /// The ROB was asked to be built with an odd depth; two-wide retirement
    /// needs an even number of slots to pair into rows.
    #[error("rob depth must be even, got {0}")]
    OddRobDepth(usize),
}
