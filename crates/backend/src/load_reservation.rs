//! Load-reservation tracker: per-hart scalar state enforcing LR/SC
//! atomicity across arbitrary speculative rollback (spec.md §4.4).
//!
//! Two-register design: `speculative` is mutated directly by LR/SC as they
//! *execute* (the memory pipeline's ReadWrite stage), while `recovery` is
//! mutated only by retirement's update interface once an LR or SC actually
//! *retires*. On a `recover` pulse the speculative copy snaps back to the
//! recovery copy, discarding whatever an instruction that never reaches
//! retirement did to it.

use crate::common::addr::PhysAddr;

/// `{address, valid}` as spec.md §3 names it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reservation {
    pub address: PhysAddr,
    pub valid: bool,
}

/// Holds the speculative and retirement-committed load-reservation state.
#[derive(Debug, Default)]
pub struct LoadReservationTracker {
    speculative: Reservation,
    recovery: Reservation,
}

impl LoadReservationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current speculative reservation, as the ReadWrite stage sees it.
    #[must_use]
    pub fn speculative(&self) -> Reservation {
        self.speculative
    }

    /// Sets the speculative reservation when an LR executes.
    pub fn execute_lr(&mut self, address: PhysAddr) {
        self.speculative = Reservation {
            address,
            valid: true,
        };
    }

    /// Whether an SC executing against `address` would succeed against the
    /// speculative reservation.
    #[must_use]
    pub fn check_sc(&self, address: PhysAddr) -> bool {
        self.speculative.valid && self.speculative.address == address
    }

    /// An SC always clears the speculative reservation as it executes,
    /// whether it succeeds or fails — standard RISC-V LR/SC semantics.
    pub fn execute_sc(&mut self) {
        self.speculative.valid = false;
    }

    /// Retirement's update interface: an LR retired, so the recovery
    /// snapshot advances to the address it reserved.
    pub fn retire_lr(&mut self, address: PhysAddr) {
        self.recovery = Reservation {
            address,
            valid: true,
        };
    }

    /// Retirement's update interface: an SC retired (success or failure),
    /// clearing the recovery snapshot's reservation.
    pub fn retire_sc(&mut self) {
        self.recovery.valid = false;
    }

    /// A `recover` pulse snaps the speculative copy back to the
    /// retirement-committed snapshot.
    pub fn recover(&mut self) {
        self.speculative = self.recovery;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lr_sets_speculative_reservation() {
        let mut tracker = LoadReservationTracker::new();
        tracker.execute_lr(PhysAddr(0x1000));
        assert_eq!(
            tracker.speculative(),
            Reservation {
                address: PhysAddr(0x1000),
                valid: true,
            }
        );
    }

    #[test]
    fn sc_succeeds_against_matching_reservation() {
        let mut tracker = LoadReservationTracker::new();
        tracker.execute_lr(PhysAddr(0x2000));
        assert!(tracker.check_sc(PhysAddr(0x2000)));
    }

    #[test]
    fn sc_fails_against_mismatched_reservation() {
        let mut tracker = LoadReservationTracker::new();
        tracker.execute_lr(PhysAddr(0x2000));
        assert!(!tracker.check_sc(PhysAddr(0x3000)));
    }

    #[test]
    fn sc_fails_with_no_prior_reservation() {
        let tracker = LoadReservationTracker::new();
        assert!(!tracker.check_sc(PhysAddr(0x1000)));
    }

    #[test]
    fn sc_clears_speculative_reservation_even_on_failure() {
        let mut tracker = LoadReservationTracker::new();
        tracker.execute_lr(PhysAddr(0x2000));
        tracker.execute_sc();
        assert!(!tracker.check_sc(PhysAddr(0x2000)));
    }

    #[test]
    fn recover_snaps_speculative_back_to_recovery() {
        let mut tracker = LoadReservationTracker::new();
        tracker.retire_lr(PhysAddr(0x4000));
        tracker.execute_lr(PhysAddr(0x5000));
        tracker.recover();
        assert_eq!(
            tracker.speculative(),
            Reservation {
                address: PhysAddr(0x4000),
                valid: true,
            }
        );
    }

    #[test]
    fn retire_sc_clears_recovery_reservation() {
        let mut tracker = LoadReservationTracker::new();
        tracker.retire_lr(PhysAddr(0x4000));
        tracker.retire_sc();
        tracker.execute_lr(PhysAddr(0x5000));
        tracker.recover();
        assert_eq!(tracker.speculative(), Reservation::default());
    }
}
