//! The Memory Pipeline: the four-stage Decode → Execute → TLB → ReadWrite
//! path every load/store/AMO/LR/SC travels (spec.md §4.2). Each stage is a
//! single pipeline register wide; a `recover` pulse clears the live entries
//! and (for an in-flight write) prevents a speculative store-queue
//! allocation, without aborting a DTLB request already in flight.

pub mod decode;
pub mod execute;
pub mod read_write;
pub mod tlb;

pub use decode::{InstKind, MemDecodeEntry, MemOp, Width};
pub use execute::MemExecuteEntry;
pub use read_write::{ReadWriteResult, ReadWriteStage, SmaReadPort};
pub use tlb::{MemTlbEntry, TlbPort, TlbStage};

use crate::load_reservation::LoadReservationTracker;
use crate::retirement::store_queue::StoreQueue;

/// The four pipeline registers, driven one cycle at a time.
#[derive(Debug, Default)]
pub struct MemoryPipeline {
    tlb_stage: TlbStage,
    read_write_stage: ReadWriteStage,
}

impl MemoryPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances all four stages by one cycle. `decode_in` is the newly
    /// decoded entry entering Decode this cycle (a bubble if nothing
    /// issued); the Execute stage is purely combinational on it, so only
    /// the TLB and ReadWrite pipeline registers are stateful here.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        decode_in: MemDecodeEntry,
        recover: bool,
        tlb_port: &mut impl TlbPort,
        sma: &mut impl SmaReadPort,
        store_queue: &mut StoreQueue,
        reservations: &mut LoadReservationTracker,
    ) -> Option<ReadWriteResult> {
        let executed = execute::execute(decode_in);
        let tlb_out = self
            .tlb_stage
            .step(executed, recover, tlb_port)
            .unwrap_or_default();
        self.read_write_stage
            .step(tlb_out, recover, sma, store_queue, reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::addr::{PhysAddr, VirtAddr};
    use crate::common::error::{MemoryErrorCode, Trap};
    use crate::execute_result::RobTag;

    struct IdentityTlb;
    impl TlbPort for IdentityTlb {
        fn request(&mut self, _vaddress: VirtAddr, _write: bool) {}
        fn poll(&mut self) -> Option<(PhysAddr, Option<MemoryErrorCode>)> {
            Some((PhysAddr(0x8000_0000), None))
        }
    }

    struct FixedMemory {
        beats: Vec<[u8; 4]>,
    }
    impl SmaReadPort for FixedMemory {
        fn request(&mut self, _paddr: PhysAddr) {}
        fn poll(&mut self) -> Option<([u8; 4], Option<Trap>)> {
            if self.beats.is_empty() {
                None
            } else {
                Some((self.beats.remove(0), None))
            }
        }
    }

    #[test]
    fn ld_from_memory_produces_the_documented_value() {
        let mut pipeline = MemoryPipeline::new();
        let mut tlb = IdentityTlb;
        let mut sma = FixedMemory {
            beats: vec![0x1122_3344u32.to_le_bytes(), 0x5566_7788u32.to_le_bytes()],
        };
        let mut store_queue = StoreQueue::try_new(4).unwrap();
        let mut reservations = LoadReservationTracker::new();

        let decode = MemDecodeEntry::imm_addressed(
            InstKind::I,
            0b011,
            0x1000,
            0x1004,
            1,
            RobTag(3),
            0x8000_0000,
            0,
            0,
        );

        // Cycle 1: Decode->Execute, TLB issues its request (Waiting).
        assert!(pipeline
            .tick(
                decode,
                false,
                &mut tlb,
                &mut sma,
                &mut store_queue,
                &mut reservations
            )
            .is_none());

        // Cycle 2: TLB answers, ReadWrite issues its first SMA beat.
        assert!(pipeline
            .tick(
                MemDecodeEntry::bubble(),
                false,
                &mut tlb,
                &mut sma,
                &mut store_queue,
                &mut reservations
            )
            .is_none());

        // Cycle 3: first beat answered, second beat requested.
        assert!(pipeline
            .tick(
                MemDecodeEntry::bubble(),
                false,
                &mut tlb,
                &mut sma,
                &mut store_queue,
                &mut reservations
            )
            .is_none());

        // Cycle 4: second beat answered, result complete.
        let out = pipeline
            .tick(
                MemDecodeEntry::bubble(),
                false,
                &mut tlb,
                &mut sma,
                &mut store_queue,
                &mut reservations,
            )
            .unwrap();
        assert_eq!(out.rob_tag, RobTag(3));
        assert_eq!(out.execute_result.result, 0x5566_7788_1122_3344);
    }
}
