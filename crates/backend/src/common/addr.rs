//! Physical and virtual address types.
//!
//! Strong wrapper types keep the two address spaces from being mixed up at
//! the memory-pipeline/TLB boundary: everything before the TLB stage is a
//! `VirtAddr`, everything after is a `PhysAddr`.

/// A virtual address, as computed by the Execute stage (`add1 + add2`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtAddr(pub u64);

/// A physical address, as returned by the external DTLB port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Wraps a raw address.
    #[inline(always)]
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline(always)]
    pub fn val(self) -> u64 {
        self.0
    }
}

impl PhysAddr {
    /// Wraps a raw address.
    #[inline(always)]
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline(always)]
    pub fn val(self) -> u64 {
        self.0
    }
}
