//! Edge-triggered event evaluation
//!
//! One tracker per session and subscribed time base. It turns raw samples
//! into the session's view of the clock plus the transitions since the last
//! delivered notification.

use types::{ClockState, EventCounts, EventMask, PtpSample, Subscription};

#[derive(Debug, Clone)]
pub struct EventTracker {
    subscription: Subscription,
    state: ClockState,
    /// Transitions not yet delivered to the client
    pending: EventCounts,
    /// The last changed state could not be delivered
    unsent: bool,
}

impl EventTracker {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            state: ClockState::default(),
            pending: EventCounts::default(),
            unsent: false,
        }
    }

    /// Tracker whose starting point is an already published sample.
    ///
    /// No transitions are counted for it.
    pub fn primed(subscription: Subscription, sample: Option<&PtpSample>) -> Self {
        let mut tracker = Self::new(subscription);
        if let Some(sample) = sample {
            tracker.state = tracker.next_state(sample);
            tracker.state.gm_changed = false;
        }
        tracker
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    /// Applies a sample and returns what should be sent, if anything.
    ///
    /// Returns `Some` when the state changed (ignoring the timestamp), when
    /// transitions are pending, or when an earlier notification was not
    /// delivered.
    pub fn evaluate(&mut self, sample: &PtpSample) -> Option<(ClockState, EventCounts)> {
        let next = self.next_state(sample);
        let previous = self.state;
        let sub = &self.subscription;
        let mut delta = EventCounts::default();

        if sub.wants(EventMask::OFFSET_IN_RANGE) && next.offset_in_range != previous.offset_in_range {
            delta.offset_in_range = 1;
        }
        if sub.wants(EventMask::SYNCED_TO_PRIMARY)
            && next.synced_to_primary_clock != previous.synced_to_primary_clock
        {
            delta.synced_to_primary_clock = 1;
        }
        if sub.wants(EventMask::AS_CAPABLE) && next.as_capable != previous.as_capable {
            delta.as_capable = 1;
        }
        if sub.wants(EventMask::GM_CHANGED) && next.gm_changed {
            delta.gm_changed = 1;
        }
        if sub.wants(EventMask::COMPOSITE) && next.composite_event != previous.composite_event {
            delta.composite = 1;
        }

        self.pending.accumulate(&delta);
        let changed = !next.same_status(&previous);
        self.state = next;
        if changed || self.unsent || !self.pending.is_zero() {
            Some((self.state, self.pending))
        } else {
            None
        }
    }

    /// The last evaluated notification reached the client.
    pub fn delivered(&mut self) {
        self.pending = EventCounts::default();
        self.unsent = false;
    }

    /// The last evaluated notification was dropped; resend on the next sample.
    pub fn undelivered(&mut self) {
        self.unsent = true;
    }

    fn next_state(&self, sample: &PtpSample) -> ClockState {
        let offset_in_range = self
            .subscription
            .offset_threshold()
            .in_range(sample.master_offset);
        let mut state = ClockState {
            gm_identity: sample.gm_identity,
            as_capable: sample.as_capable,
            offset_in_range,
            synced_to_primary_clock: sample.synced_to_primary_clock,
            gm_changed: sample.gm_identity != self.state.gm_identity,
            composite_event: false,
            clock_offset: sample.master_offset,
            notification_timestamp: sample.timestamp_ns,
        };
        state.composite_event = composite(&self.subscription, &state);
        state
    }
}

/// AND of the conditions selected by the composite mask; false when none are.
fn composite(sub: &Subscription, state: &ClockState) -> bool {
    let mask = sub.composite_mask;
    if mask.is_empty() {
        return false;
    }
    (!mask.contains(EventMask::OFFSET_IN_RANGE) || state.offset_in_range)
        && (!mask.contains(EventMask::SYNCED_TO_PRIMARY) || state.synced_to_primary_clock)
        && (!mask.contains(EventMask::AS_CAPABLE) || state.as_capable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::OFFSET_THRESHOLD;

    fn offset_subscription() -> Subscription {
        let mut sub = Subscription::new(EventMask::OFFSET_IN_RANGE | EventMask::GM_CHANGED);
        sub.define_threshold(OFFSET_THRESHOLD, 8888, -8888).unwrap();
        sub
    }

    fn sample(offset: i64, gm: u8) -> PtpSample {
        PtpSample {
            master_offset: offset,
            gm_identity: [gm; 8],
            synced_to_primary_clock: true,
            as_capable: true,
            timestamp_ns: 1,
        }
    }

    #[test]
    fn offset_counts_only_on_edges() {
        let mut tracker = EventTracker::primed(offset_subscription(), Some(&sample(20_000, 1)));
        assert!(!tracker.state().offset_in_range);

        let (state, counts) = tracker.evaluate(&sample(100, 1)).unwrap();
        assert!(state.offset_in_range);
        assert_eq!(counts.offset_in_range, 1);
        tracker.delivered();

        // still in range, offset moved: state changes but no new edge
        let (_, counts) = tracker.evaluate(&sample(-100, 1)).unwrap();
        assert_eq!(counts.offset_in_range, 0);
        tracker.delivered();

        assert!(tracker.evaluate(&PtpSample { timestamp_ns: 9, ..sample(-100, 1) }).is_none());
    }

    #[test]
    fn gm_change_is_set_then_cleared() {
        let mut tracker = EventTracker::primed(offset_subscription(), Some(&sample(0, 1)));
        let (state, counts) = tracker.evaluate(&sample(0, 2)).unwrap();
        assert!(state.gm_changed);
        assert_eq!(counts.gm_changed, 1);
        tracker.delivered();

        let (state, counts) = tracker.evaluate(&sample(0, 2)).unwrap();
        assert!(!state.gm_changed);
        assert!(counts.is_zero());
    }

    #[test]
    fn undelivered_counts_carry_over() {
        let mut tracker = EventTracker::primed(offset_subscription(), Some(&sample(20_000, 1)));
        tracker.evaluate(&sample(0, 1)).unwrap();
        tracker.undelivered();
        let (_, counts) = tracker.evaluate(&sample(20_000, 1)).unwrap();
        assert_eq!(counts.offset_in_range, 2);

        tracker.delivered();
        tracker.evaluate(&sample(20_000, 1));
        tracker.undelivered();
        assert!(tracker.evaluate(&sample(20_000, 1)).is_some());
    }

    #[test]
    fn composite_requires_every_selected_condition() {
        let sub = offset_subscription()
            .with_composite(EventMask::OFFSET_IN_RANGE | EventMask::SYNCED_TO_PRIMARY)
            .unwrap();
        let mut tracker = EventTracker::new(sub);

        let (state, counts) = tracker.evaluate(&sample(0, 1)).unwrap();
        assert!(state.composite_event);
        assert_eq!(counts.composite, 1);
        tracker.delivered();

        let unsynced = PtpSample {
            synced_to_primary_clock: false,
            ..sample(0, 1)
        };
        let (state, counts) = tracker.evaluate(&unsynced).unwrap();
        assert!(!state.composite_event);
        assert_eq!(counts.composite, 1);
        // not subscribed to synced itself
        assert_eq!(counts.synced_to_primary_clock, 0);
    }

    #[test]
    fn unprimed_tracker_starts_from_defaults() {
        let tracker = EventTracker::primed(offset_subscription(), None);
        assert_eq!(*tracker.state(), ClockState::default());
    }
}
