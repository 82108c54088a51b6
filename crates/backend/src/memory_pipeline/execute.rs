//! Memory Pipeline Execute stage: computes the effective address and checks
//! alignment (spec.md §4.2).

use crate::common::addr::VirtAddr;
use crate::common::error::MemoryErrorCode;
use crate::execute_result::RobTag;
use crate::memory_pipeline::decode::{MemDecodeEntry, MemOp, Width};

/// The Execute stage's register entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemExecuteEntry {
    pub valid: bool,
    pub pc: u64,
    pub spec: u64,
    pub rd: u8,
    pub rob_tag: RobTag,
    pub op: Option<MemOp>,
    pub op1: u64,
    pub vaddress: VirtAddr,
    pub error: Option<MemoryErrorCode>,
}

/// Computes `vaddress = add1 + add2` and tags a pre-existing misalignment.
/// A bubble (`!valid`) propagates unchanged, per spec.md's Decode-stage open
/// question: an invalid entry is never treated as a real operation.
#[must_use]
pub fn execute(decode: MemDecodeEntry) -> MemExecuteEntry {
    if !decode.valid {
        return MemExecuteEntry::default();
    }
    let Some(op) = decode.op else {
        return MemExecuteEntry {
            valid: true,
            pc: decode.pc,
            spec: decode.spec,
            rd: decode.rd,
            rob_tag: decode.rob_tag,
            op: None,
            op1: decode.op1,
            vaddress: VirtAddr::new(decode.add1.wrapping_add(decode.add2)),
            error: None,
        };
    };

    let vaddress = VirtAddr::new(decode.add1.wrapping_add(decode.add2));
    let misaligned = match op.width() {
        Width::Byte => false,
        Width::Half => vaddress.val() & 0b1 != 0,
        Width::Word => vaddress.val() & 0b11 != 0,
        Width::Double => vaddress.val() & 0b11 != 0,
    };

    MemExecuteEntry {
        valid: true,
        pc: decode.pc,
        spec: decode.spec,
        rd: decode.rd,
        rob_tag: decode.rob_tag,
        op: Some(op),
        op1: decode.op1,
        vaddress,
        error: misaligned.then_some(MemoryErrorCode::Misaligned),
    }
}
