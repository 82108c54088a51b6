//! Store-queue bypass overlay for the SMA read port (spec.md §4.1).
//!
//! Sits between a read requester and the arbiter for a 4-byte window:
//! forwards the address unchanged, and byte-wise replaces each fetched byte
//! whose strobe bit is set with the youngest committed-but-unwritten
//! store's data. Read errors pass through untouched — bypass never clears
//! an error the memory hierarchy reported.

use crate::common::error::Trap;
use crate::retirement::store_queue::ByteBypass;

/// Overlays `bypass` onto a fetched 4-byte window, per spec.md §8's
/// byte-bypass invariant: `out[k] = strobe[k] ? bypass.data[k] : mem.data[k]`.
#[must_use]
pub fn bypass_read(
    mem_data: [u8; 4],
    mem_error: Option<Trap>,
    bypass: ByteBypass,
) -> ([u8; 4], Option<Trap>) {
    let mut out = mem_data;
    for k in 0..4 {
        if bypass.strobe[k] {
            out[k] = bypass.data[k];
        }
    }
    (out, mem_error)
}
