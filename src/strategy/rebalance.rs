//! Rebalance cadence gate.
//!
//! Both the universe selector and the alpha model own one of these. Work is
//! permitted only when the current time strictly exceeds the stored cursor;
//! a permitted call moves the cursor to `now + cadence`.

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

/// Whether the gate would let a call through at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// `now <= cursor`
    Waiting,
    /// `now > cursor` (or never rebalanced)
    Due,
}

/// Per-component rebalance cursor.
#[derive(Debug, Clone)]
pub struct RebalanceGate {
    cadence: Duration,
    /// `None` until the first rebalance
    next_allowed: Option<DateTime<Utc>>,
}

impl RebalanceGate {
    /// Create a gate that has never fired.
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            next_allowed: None,
        }
    }

    /// Create a gate with a cadence of whole days.
    pub fn days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Cursor value; `None` means never rebalanced.
    pub fn next_allowed(&self) -> Option<DateTime<Utc>> {
        self.next_allowed
    }

    /// Inspect the gate without moving it.
    pub fn state(&self, now: DateTime<Utc>) -> GateState {
        match self.next_allowed {
            Some(cursor) if now <= cursor => GateState::Waiting,
            _ => GateState::Due,
        }
    }

    /// Let the call through if due, advancing the cursor. Returns whether it fired.
    pub fn try_fire(&mut self, now: DateTime<Utc>) -> bool {
        if self.state(now) == GateState::Waiting {
            trace!(%now, next_allowed = ?self.next_allowed, "Rebalance not due");
            return false;
        }

        self.next_allowed = Some(now + self.cadence);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 7, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_gate_is_due() {
        let gate = RebalanceGate::days(1);
        assert_eq!(gate.state(t0()), GateState::Due);
        assert!(gate.next_allowed().is_none());
    }

    #[test]
    fn test_fire_advances_cursor_by_cadence() {
        let mut gate = RebalanceGate::days(1);

        assert!(gate.try_fire(t0()));
        assert_eq!(gate.next_allowed(), Some(t0() + Duration::days(1)));
    }

    #[test]
    fn test_waiting_until_strictly_after_cursor() {
        let mut gate = RebalanceGate::days(1);
        gate.try_fire(t0());

        assert!(!gate.try_fire(t0() + Duration::hours(12)));
        // Exactly at the cursor is still waiting
        assert!(!gate.try_fire(t0() + Duration::days(1)));
        assert!(gate.try_fire(t0() + Duration::days(1) + Duration::seconds(1)));
    }

    #[test]
    fn test_waiting_call_does_not_move_cursor() {
        let mut gate = RebalanceGate::days(1);
        gate.try_fire(t0());
        let cursor = gate.next_allowed();

        gate.try_fire(t0() + Duration::hours(1));
        assert_eq!(gate.next_allowed(), cursor);
    }

    #[test]
    fn test_fires_once_per_window() {
        let mut gate = RebalanceGate::days(1);
        let fired = (0..24)
            .map(|h| t0() + Duration::hours(h))
            .filter(|&t| gate.try_fire(t))
            .count();

        assert_eq!(fired, 1);
    }
}
