//! Clock status values
//!
//! `ClockState` and `EventCounts` are what application code sees after a
//! notification. `PtpSample` is the raw reading the proxy's monitor thread
//! publishes before any per-session evaluation.

use std::fmt;

/// Grandmaster clock identity (EUI-64)
pub type ClockIdentity = [u8; 8];

/// Published clock status for one time base, as seen by one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ClockState {
    pub gm_identity: ClockIdentity,
    pub as_capable: bool,
    pub offset_in_range: bool,
    pub synced_to_primary_clock: bool,
    pub gm_changed: bool,
    pub composite_event: bool,
    /// Offset from the primary clock in nanoseconds
    pub clock_offset: i64,
    /// Proxy-side time of the sample this state was derived from, in nanoseconds
    pub notification_timestamp: u64,
}

impl ClockState {
    /// Equality ignoring the notification timestamp
    pub fn same_status(&self, other: &Self) -> bool {
        Self {
            notification_timestamp: 0,
            ..*self
        } == Self {
            notification_timestamp: 0,
            ..*other
        }
    }
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gm={} offset={}ns in_range={} synced={} as_capable={} gm_changed={} composite={}",
            hex::encode(self.gm_identity),
            self.clock_offset,
            self.offset_in_range,
            self.synced_to_primary_clock,
            self.as_capable,
            self.gm_changed,
            self.composite_event,
        )
    }
}

/// Edge-triggered event counters
///
/// Each counter advances only when its condition flips, never while it
/// merely holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventCounts {
    pub offset_in_range: u32,
    pub synced_to_primary_clock: u32,
    pub as_capable: u32,
    pub gm_changed: u32,
    pub composite: u32,
}

impl EventCounts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Adds a delta received from the proxy.
    pub fn accumulate(&mut self, delta: &EventCounts) {
        self.offset_in_range = self.offset_in_range.wrapping_add(delta.offset_in_range);
        self.synced_to_primary_clock = self
            .synced_to_primary_clock
            .wrapping_add(delta.synced_to_primary_clock);
        self.as_capable = self.as_capable.wrapping_add(delta.as_capable);
        self.gm_changed = self.gm_changed.wrapping_add(delta.gm_changed);
        self.composite = self.composite.wrapping_add(delta.composite);
    }

    /// Returns the current counts and resets them to zero.
    pub fn take(&mut self) -> EventCounts {
        std::mem::take(self)
    }
}

/// Raw clock reading for one time base, before subscription filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PtpSample {
    pub master_offset: i64,
    pub gm_identity: ClockIdentity,
    pub synced_to_primary_clock: bool,
    pub as_capable: bool,
    pub timestamp_ns: u64,
}
