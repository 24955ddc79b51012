//! Per-member position write coalescing.
//!
//! # Invariants
//! - At most one pending write exists per member id; a newer position replaces
//!   the older one and restarts that member's quiet window.
//! - Members never share a timer, so dragging one member cannot drop the
//!   pending write of another.
//! - Time is passed in explicitly; the debouncer never reads the clock.

use crate::model::member::{MemberId, Position};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingWrite {
    position: Position,
    last_touched: Instant,
}

/// Coalesces repeated position updates into one write per member.
#[derive(Debug, Clone)]
pub struct PositionDebouncer {
    quiet_period: Duration,
    pending: BTreeMap<MemberId, PendingWrite>,
}

impl PositionDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: BTreeMap::new(),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Records `position` as the latest value for `member_id` at `now`.
    pub fn schedule(&mut self, member_id: MemberId, position: Position, now: Instant) {
        self.pending.insert(
            member_id,
            PendingWrite {
                position,
                last_touched: now,
            },
        );
    }

    /// Removes and returns every write whose quiet window has elapsed at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(MemberId, Position)> {
        let due: Vec<MemberId> = self
            .pending
            .iter()
            .filter(|(_, write)| now.saturating_duration_since(write.last_touched) >= self.quiet_period)
            .map(|(id, _)| *id)
            .collect();

        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|write| (id, write.position)))
            .collect()
    }

    /// Removes and returns every pending write regardless of timing.
    pub fn drain_all(&mut self) -> Vec<(MemberId, Position)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(id, write)| (id, write.position))
            .collect()
    }

    /// Drops the pending write of a member that no longer exists.
    pub fn cancel(&mut self, member_id: MemberId) -> bool {
        self.pending.remove(&member_id).is_some()
    }

    pub fn is_pending(&self, member_id: MemberId) -> bool {
        self.pending.contains_key(&member_id)
    }

    pub fn pending_position(&self, member_id: MemberId) -> Option<Position> {
        self.pending.get(&member_id).map(|write| write.position)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest instant at which some pending write becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|write| write.last_touched + self.quiet_period)
            .min()
    }
}
