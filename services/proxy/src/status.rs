//! Values exchanged between the proxy's threads
//!
//! ```text
//!              ClockStatus (StatusTable)
//!   monitor ───────────────────────────────► notifier
//!      ▲                                     dispatch (snapshot only)
//!      │      ClockConfiguration (InterestTable)
//!      └──────────────────────────────────── dispatch
//! ```

use exchange::StateExchange;
use types::{EventMask, PtpSample};

/// Latest raw sample per time base, indexed from 1
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTable {
    samples: Vec<Option<PtpSample>>,
}

impl StatusTable {
    pub fn new(time_bases: usize) -> Self {
        Self {
            samples: vec![None; time_bases],
        }
    }

    pub fn get(&self, index: i32) -> Option<&PtpSample> {
        slot(index).and_then(|i| self.samples.get(i)?.as_ref())
    }

    /// Records a sample; unknown indices are ignored. Returns whether the table changed.
    pub fn set(&mut self, index: i32, sample: PtpSample) -> bool {
        match slot(index).and_then(|i| self.samples.get_mut(i)) {
            Some(entry) if *entry != Some(sample) => {
                *entry = Some(sample);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What the sessions want from one time base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    /// Union of every subscribed event mask
    pub events: EventMask,
    pub subscribers: u32,
}

/// Per-time-base interest, indexed from 1
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestTable {
    entries: Vec<Interest>,
}

impl InterestTable {
    pub fn new(time_bases: usize) -> Self {
        Self {
            entries: vec![Interest::default(); time_bases],
        }
    }

    pub fn get(&self, index: i32) -> Option<&Interest> {
        slot(index).and_then(|i| self.entries.get(i))
    }

    pub fn add(&mut self, index: i32, events: EventMask) {
        if let Some(entry) = slot(index).and_then(|i| self.entries.get_mut(i)) {
            entry.events.insert(events);
            entry.subscribers += 1;
        }
    }

    pub fn is_watched(&self, index: i32) -> bool {
        self.get(index).is_some_and(|entry| entry.subscribers > 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Interest)> {
        (1..).zip(self.entries.iter())
    }
}

fn slot(index: i32) -> Option<usize> {
    usize::try_from(index).ok()?.checked_sub(1)
}

/// Raw clock status, produced by the monitor thread
pub type ClockStatus = StateExchange<StatusTable>;

/// Subscription interest, produced by message dispatch
pub type ClockConfiguration = StateExchange<InterestTable>;

pub fn clock_status(time_bases: usize) -> ClockStatus {
    StateExchange::new("clock-status", StatusTable::new(time_bases))
}

pub fn clock_configuration(time_bases: usize) -> ClockConfiguration {
    StateExchange::new("clock-configuration", InterestTable::new(time_bases))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_index_from_one() {
        let mut status = StatusTable::new(2);
        let sample = PtpSample {
            master_offset: 5,
            ..Default::default()
        };
        assert!(status.set(2, sample));
        assert!(!status.set(2, sample));
        assert!(!status.set(0, sample));
        assert!(!status.set(3, sample));
        assert_eq!(status.get(2), Some(&sample));
        assert_eq!(status.get(1), None);

        let mut interest = InterestTable::new(2);
        interest.add(1, EventMask::OFFSET_IN_RANGE);
        interest.add(1, EventMask::GM_CHANGED);
        interest.add(-1, EventMask::ALL);
        assert!(interest.is_watched(1));
        assert!(!interest.is_watched(2));
        let first = interest.get(1).unwrap();
        assert_eq!(first.subscribers, 2);
        assert_eq!(first.events, EventMask::OFFSET_IN_RANGE | EventMask::GM_CHANGED);
        assert_eq!(interest.iter().count(), 2);
    }
}
