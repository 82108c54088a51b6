//! SMA (Simple Memory Access) reader arbiter and store-queue bypass overlay
//! — the leaf component every load ultimately reads through (spec.md §4.1).

pub mod arbiter;
pub mod bypass;

pub use arbiter::{Grant, ReadArbiter, ReadRequest};
pub use bypass::bypass_read;
