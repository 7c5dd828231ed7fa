//! # Controller State
//!
//! Drain pipeline state, the runtime-anchored wall clock, and the snapshot
//! published to observers.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::position::Position;

/// Where the read → send → delete chain currently is
///
/// At most one queue or transport operation of the chain is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// No chain running
    Idle,
    /// A read, send or delete for the chain is in flight
    Busy,
    /// The chain failed and resumes at the given instant
    RetryPending { at: Instant },
}

impl DrainState {
    pub fn retry_deadline(&self) -> Option<Instant> {
        match self {
            DrainState::RetryPending { at } => Some(*at),
            _ => None,
        }
    }
}

/// Wall-clock time derived from the runtime's monotonic clock
///
/// Timestamps advance exactly with `tokio::time`, which keeps heartbeat
/// timestamps consistent with the interval timer.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin_utc: Utc::now(),
            origin: Instant::now(),
        }
    }

    /// Wall-clock time corresponding to `instant`
    pub fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = instant.saturating_duration_since(self.origin);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.origin_utc + elapsed
    }

    #[cfg(test)]
    pub fn now(&self) -> DateTime<Utc> {
        self.at(Instant::now())
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the controller, for status display and tests
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerSnapshot {
    pub online: bool,
    /// The queue was found empty; the next stored position restarts the drain
    pub waiting_for_data: bool,
    pub draining: bool,
    pub retry_pending: bool,
    pub last_position: Option<Position>,
}
