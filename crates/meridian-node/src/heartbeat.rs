//! Periodic status broadcast.
//!
//! Cadence is measured against the monotonic clock and re-anchored at each
//! emission, so inter-emission gaps are never shorter than the interval no
//! matter how the loop is scheduled. The transfer-id counter lives here,
//! owned state rather than a hidden static, wrapping at the protocol
//! modulus.

use meridian_core::{Microseconds, TransferId};

use crate::codec::{Health, Heartbeat, Mode};

/// Fixed broadcast interval: one heartbeat per second.
pub const HEARTBEAT_INTERVAL: Microseconds = 1_000_000;

/// Heartbeats not on the wire within this budget are dropped, not sent
/// stale.
pub const HEARTBEAT_TX_DEADLINE: Microseconds = 1_000_000;

/// Tracks heartbeat cadence and builds successive status transfers.
pub struct HeartbeatPublisher {
    started_at: Microseconds,
    last_emit: Option<Microseconds>,
    transfer_id: TransferId,
    health: Health,
    mode: Mode,
    vendor_status: u8,
}

impl HeartbeatPublisher {
    pub fn new(started_at: Microseconds) -> Self {
        Self {
            started_at,
            last_emit: None,
            transfer_id: TransferId::new(0),
            health: Health::Nominal,
            mode: Mode::Operational,
            vendor_status: 0,
        }
    }

    pub fn set_health(&mut self, health: Health) {
        self.health = health;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Whether an emission is due at `now`.
    pub fn due(&self, now: Microseconds) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.saturating_sub(last) >= HEARTBEAT_INTERVAL,
        }
    }

    /// Build the next heartbeat and advance the counter. Call only when
    /// [`Self::due`] returns true.
    pub fn emit(&mut self, now: Microseconds) -> (Heartbeat, TransferId) {
        let heartbeat = Heartbeat {
            uptime_seconds: (now.saturating_sub(self.started_at) / 1_000_000) as u32,
            health: self.health,
            mode: self.mode,
            vendor_status: self.vendor_status,
        };
        let tid = self.transfer_id;
        self.transfer_id = self.transfer_id.wrapping_next();
        self.last_emit = Some(now);
        (heartbeat, tid)
    }
}
