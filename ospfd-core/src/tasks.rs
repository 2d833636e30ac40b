//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Timer and event scheduling.
//!
//! All protocol timers live on a single deadline-ordered queue, dispatched
//! strictly sequentially by the instance event loop. A scheduled timer is
//! never removed from the queue ahead of time: cancellation works by
//! forgetting the timer's token, which invalidates the queue entry when it
//! eventually fires.
//!
//!                                      +--------------+
//! retransmission intervals (Nx) ----> |              |
//! delayed-ack timeouts (Nx) --------> |              |
//! ls-update send timeouts (Nx) -----> |  TimerQueue  | --> dispatch
//! lsa expiry timeouts (Nx) ---------> |              |
//! refresh tick / maxage sweep (1x) -> |              |
//!                                      +--------------+

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::collections::{AreaId, InterfaceId, LsaEntryId, LsdbId, NeighborId};
use crate::neighbor::{RxmtPacketType, nsm};
use crate::packet::lsa::LsaKey;

// Grouping delay for LS Update transmissions.
pub(crate) const LS_UPDATE_SEND_DELAY: Duration = Duration::from_millis(100);
// Delayed acknowledgment timeout (must be less than RxmtInterval).
pub(crate) const DELAYED_ACK_TIMEOUT: Duration = Duration::from_secs(1);
// Interval between two MaxAge sweeps of the LSDB.
pub(crate) const MAXAGE_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

pub type TimerToken = u64;

// Process-wide timer queue.
#[derive(Debug)]
pub struct TimerQueue {
    now: Instant,
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_token: TimerToken,
}

#[derive(Debug, Eq, PartialEq)]
struct TimerEntry {
    deadline: Instant,
    token: TimerToken,
    kind: TimerKind,
}

// Timer inventory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TimerKind {
    // An installed LSA reached MaxAge.
    LsaExpiry {
        lsdb_id: LsdbId,
        lse_id: LsaEntryId,
    },
    // MinLSInterval delayed origination.
    LsaOrigDelayed {
        lsdb_id: LsdbId,
        lsa_key: LsaKey,
    },
    // Refresh-queue granularity tick.
    LsaRefreshTick,
    // Periodic MaxAge registry sweep.
    MaxAgeSweep,
    // Per-neighbor packet retransmission interval.
    RxmtInterval {
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        packet_type: RxmtPacketType,
    },
    // Per-interface delayed acknowledgment timeout.
    DelayedAck {
        area_id: AreaId,
        iface_id: InterfaceId,
    },
    // Per-interface LS Update transmission timeout.
    LsUpdateSend {
        area_id: AreaId,
        iface_id: InterfaceId,
    },
}

// Internal events deferred to the end of the current dispatch turn, so
// handlers never re-enter the arenas they are iterating.
#[derive(Debug)]
pub enum InternalEvent {
    NsmEvent {
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: NeighborId,
        event: nsm::Event,
    },
    SendLsUpdate {
        area_id: AreaId,
        iface_id: InterfaceId,
        nbr_id: Option<NeighborId>,
    },
}

// ===== impl TimerQueue =====

impl TimerQueue {
    pub(crate) fn new(now: Instant) -> TimerQueue {
        TimerQueue {
            now,
            heap: Default::default(),
            next_token: 0,
        }
    }

    // Schedules a timer relative to the queue's current time.
    pub(crate) fn schedule(
        &mut self,
        timeout: Duration,
        kind: TimerKind,
    ) -> TimerToken {
        self.next_token += 1;
        let token = self.next_token;
        self.heap.push(Reverse(TimerEntry {
            deadline: self.now + timeout,
            token,
            kind,
        }));
        token
    }

    // Pops the next timer whose deadline has passed, advancing the queue's
    // notion of the current time.
    pub(crate) fn pop_due(
        &mut self,
        now: Instant,
    ) -> Option<(TimerToken, TimerKind)> {
        if now > self.now {
            self.now = now;
        }
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.deadline <= self.now => {
                let Reverse(entry) = self.heap.pop().unwrap();
                Some((entry.token, entry.kind))
            }
            _ => None,
        }
    }

    // Returns the queue's notion of the current time.
    pub(crate) fn now(&self) -> Instant {
        self.now
    }

    // Returns the deadline of the earliest pending timer, for the event
    // loop to sleep on.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }
}

// ===== impl TimerEntry =====

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.token.cmp(&other.token))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
