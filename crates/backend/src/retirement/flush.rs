//! The cache/TLB flush sub-FSM retirement enters for FENCE.I / SFENCE.VMA
//! (spec.md §4.5 "Flush FSM").

/// Per-cache/TLB flush handshake: the consumer half of spec.md §6.7.
pub trait FlushSink {
    /// Assert a flush request for this cycle.
    fn request(&mut self);
    /// Whether the sink is idle (drained) this cycle.
    fn is_empty(&self) -> bool;
}

/// Which flushes a retiring instruction requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushRequest {
    pub dcache: bool,
    pub icache: bool,
    pub tlb: bool,
}

impl FlushRequest {
    #[must_use]
    pub fn any(self) -> bool {
        self.dcache || self.icache || self.tlb
    }
}

/// The flush sub-FSM's current stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushStage {
    /// Not flushing; normal retirement proceeds.
    #[default]
    Retire,
    /// Draining the D-cache.
    DCache,
    /// Draining the I-cache.
    ICache,
    /// Draining the TLB.
    Tlb,
}

/// Sequences D-cache → I-cache → TLB flushes, serializing FENCE.I /
/// SFENCE.VMA semantics across the caches named in a `flushID`'s request.
#[derive(Debug, Default)]
pub struct FlushFsm {
    stage: FlushStage,
    request: FlushRequest,
    /// Which ROB retire slot (0 or 1) triggered this flush; carried through
    /// so the caller knows which entry to finish retiring once it drains.
    flush_id: u8,
}

/// What the flush FSM wants the caller to do this cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum FlushStep {
    /// Still draining a cache/TLB; nothing else retires this cycle.
    Waiting,
    /// All requested caches drained; assert `recover` and resume retirement.
    Done { flush_id: u8 },
}

impl FlushFsm {
    /// True while a flush sequence is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stage != FlushStage::Retire
    }

    /// Enters the flush FSM for a retiring instruction that requested one or
    /// more cache/TLB flushes.
    pub fn enter(&mut self, request: FlushRequest, flush_id: u8) {
        self.request = request;
        self.flush_id = flush_id;
        self.stage = FlushStage::DCache;
    }

    /// Advances the FSM by one cycle given the current drain state of each
    /// sink, skipping any cache/TLB this request didn't ask to flush.
    pub fn step(
        &mut self,
        dcache: &mut impl FlushSink,
        icache: &mut impl FlushSink,
        tlb: &mut impl FlushSink,
    ) -> FlushStep {
        loop {
            match self.stage {
                FlushStage::Retire => return FlushStep::Waiting,
                FlushStage::DCache => {
                    if !self.request.dcache {
                        self.stage = FlushStage::ICache;
                        continue;
                    }
                    dcache.request();
                    if dcache.is_empty() {
                        self.stage = FlushStage::ICache;
                        continue;
                    }
                    return FlushStep::Waiting;
                }
                FlushStage::ICache => {
                    if !self.request.icache {
                        self.stage = FlushStage::Tlb;
                        continue;
                    }
                    icache.request();
                    if icache.is_empty() {
                        self.stage = FlushStage::Tlb;
                        continue;
                    }
                    return FlushStep::Waiting;
                }
                FlushStage::Tlb => {
                    if !self.request.tlb {
                        self.stage = FlushStage::Retire;
                        return FlushStep::Done {
                            flush_id: self.flush_id,
                        };
                    }
                    tlb.request();
                    if tlb.is_empty() {
                        self.stage = FlushStage::Retire;
                        return FlushStep::Done {
                            flush_id: self.flush_id,
                        };
                    }
                    return FlushStep::Waiting;
                }
            }
        }
    }
}
