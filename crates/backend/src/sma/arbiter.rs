//! Fixed-priority 2-to-1 arbiter for the shared SMA read port (spec.md §4.1).
//!
//! Three states: `idle → pending1 | pending2 → idle`. Requester 1 always
//! wins a contested `idle` cycle; once a grant is made it is held — the
//! other requester cannot preempt it — until the grantee's `ready` pulses.

/// Access width of a read request, per spec.md §6.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadWidth {
    Byte,
    Half,
    Word,
}

/// A pending read request from one of the two requesters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u64,
    pub width: ReadWidth,
}

/// Which requester currently holds the port, and its request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
    /// `1` or `2`.
    pub requester: u8,
    pub request: ReadRequest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ArbiterState {
    #[default]
    Idle,
    Pending1(ReadRequest),
    Pending2(ReadRequest),
}

/// The read-port arbiter's state machine.
#[derive(Debug, Default)]
pub struct ReadArbiter {
    state: ArbiterState,
}

impl ReadArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the arbiter by one cycle, returning the grant asserted this
    /// cycle (if any). `ready` is the grantee's handshake pulse; when set,
    /// the arbiter returns to `idle` for the next cycle.
    pub fn step(
        &mut self,
        req1: Option<ReadRequest>,
        req2: Option<ReadRequest>,
        ready: bool,
    ) -> Option<Grant> {
        if self.state == ArbiterState::Idle {
            self.state = match (req1, req2) {
                (Some(r), _) => ArbiterState::Pending1(r),
                (None, Some(r)) => ArbiterState::Pending2(r),
                (None, None) => ArbiterState::Idle,
            };
        }

        let grant = match self.state {
            ArbiterState::Idle => None,
            ArbiterState::Pending1(request) => Some(Grant {
                requester: 1,
                request,
            }),
            ArbiterState::Pending2(request) => Some(Grant {
                requester: 2,
                request,
            }),
        };

        if ready {
            self.state = ArbiterState::Idle;
        }
        grant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(address: u64) -> ReadRequest {
        ReadRequest {
            address,
            width: ReadWidth::Word,
        }
    }

    #[test]
    fn requester_one_wins_a_contested_cycle() {
        let mut arbiter = ReadArbiter::new();
        let grant = arbiter.step(Some(req(0x1000)), Some(req(0x2000)), false);
        assert_eq!(grant.unwrap().requester, 1);
    }

    #[test]
    fn grant_is_held_until_ready_pulses() {
        let mut arbiter = ReadArbiter::new();
        let _ = arbiter.step(Some(req(0x1000)), None, false);
        // Requester 2 shows up mid-transaction; it must not preempt.
        let grant = arbiter.step(None, Some(req(0x2000)), false);
        assert_eq!(grant.unwrap().requester, 1);
        assert_eq!(grant.unwrap().request.address, 0x1000);
    }

    #[test]
    fn ready_releases_the_grant_for_the_next_cycle() {
        let mut arbiter = ReadArbiter::new();
        let _ = arbiter.step(Some(req(0x1000)), None, true);
        let grant = arbiter.step(None, Some(req(0x2000)), false);
        assert_eq!(grant.unwrap().requester, 2);
    }

    #[test]
    fn idle_with_no_requests_grants_nothing() {
        let mut arbiter = ReadArbiter::new();
        assert!(arbiter.step(None, None, false).is_none());
    }
}
