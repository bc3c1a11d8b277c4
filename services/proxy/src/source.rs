//! Clock sample sources
//!
//! The real ptp4l/chrony readers live outside this crate. Anything that can
//! produce [`PtpSample`]s implements [`ClockSource`] and is driven by the
//! monitor thread.

use crate::status::InterestTable;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};
use types::{ClockIdentity, PtpSample};

pub trait ClockSource: Send {
    /// Waits up to `timeout` for the next sample and its time-base index.
    fn next_sample(&mut self, timeout: Duration) -> Option<(i32, PtpSample)>;

    /// Called whenever the set of subscribed time bases or events changes.
    fn update_interest(&mut self, interest: &InterestTable);

    /// Whether PTP data can be provided at all; advertised on connect
    fn ptp_available(&self) -> bool {
        true
    }
}

/// Wall-clock time in nanoseconds
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

struct SimulatedClock {
    rng: StdRng,
    offset: i64,
    gm: ClockIdentity,
    as_capable: bool,
}

/// Bounded random walk per time base
///
/// Only time bases with subscribers produce samples.
pub struct SimulatedClockSource {
    clocks: Vec<SimulatedClock>,
    watched: Vec<bool>,
    period: Duration,
    next_due: Instant,
    cursor: usize,
}

impl SimulatedClockSource {
    /// Offsets stay within this many nanoseconds of zero
    pub const OFFSET_BOUND: i64 = 20_000;
    const STEP: i64 = 1_500;
    const SYNC_LIMIT: i64 = 10_000;

    pub fn new(time_bases: usize, seed: u64, period: Duration) -> Self {
        let clocks = (0..time_bases)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed ^ (i as u64 + 1));
                let gm = rng.gen();
                SimulatedClock {
                    rng,
                    offset: 0,
                    gm,
                    as_capable: true,
                }
            })
            .collect();
        Self {
            clocks,
            watched: vec![false; time_bases],
            period,
            next_due: Instant::now(),
            cursor: 0,
        }
    }

    fn next_watched(&mut self) -> Option<usize> {
        let count = self.clocks.len();
        (0..count)
            .map(|step| (self.cursor + step) % count)
            .find(|&i| self.watched[i])
            .inspect(|&i| self.cursor = (i + 1) % count)
    }

    fn step(clock: &mut SimulatedClock) -> PtpSample {
        let drift = clock.rng.gen_range(-Self::STEP..=Self::STEP);
        clock.offset = (clock.offset + drift).clamp(-Self::OFFSET_BOUND, Self::OFFSET_BOUND);
        if clock.rng.gen_bool(0.002) {
            clock.gm = clock.rng.gen();
        }
        if clock.rng.gen_bool(0.01) {
            clock.as_capable = !clock.as_capable;
        }
        PtpSample {
            master_offset: clock.offset,
            gm_identity: clock.gm,
            synced_to_primary_clock: clock.offset.abs() < Self::SYNC_LIMIT,
            as_capable: clock.as_capable,
            timestamp_ns: now_ns(),
        }
    }
}

impl ClockSource for SimulatedClockSource {
    fn next_sample(&mut self, timeout: Duration) -> Option<(i32, PtpSample)> {
        let now = Instant::now();
        let deadline = now + timeout;
        if self.next_due > deadline {
            std::thread::sleep(timeout);
            return None;
        }
        std::thread::sleep(self.next_due.saturating_duration_since(now));
        self.next_due = Instant::now() + self.period;

        let Some(i) = self.next_watched() else {
            return None;
        };
        let sample = Self::step(&mut self.clocks[i]);
        trace!("Simulated time base {}: offset {}", i + 1, sample.master_offset);
        Some((i as i32 + 1, sample))
    }

    fn update_interest(&mut self, interest: &InterestTable) {
        for (index, entry) in interest.iter() {
            if let Some(flag) = self.watched.get_mut(index as usize - 1) {
                *flag = entry.subscribers > 0;
            }
        }
        debug!(
            "Simulating {} of {} time bases",
            self.watched.iter().filter(|w| **w).count(),
            self.watched.len()
        );
    }
}

/// Samples pushed through a channel by an embedding application or test
pub struct ChannelClockSource {
    samples: Receiver<(i32, PtpSample)>,
    interest: Option<Sender<InterestTable>>,
    ptp_available: bool,
}

impl ChannelClockSource {
    pub fn channel() -> (Sender<(i32, PtpSample)>, Self) {
        let (tx, rx) = unbounded();
        (
            tx,
            Self {
                samples: rx,
                interest: None,
                ptp_available: true,
            },
        )
    }

    /// Forwards every interest update to `sink`.
    pub fn with_interest_sink(mut self, sink: Sender<InterestTable>) -> Self {
        self.interest = Some(sink);
        self
    }

    pub fn with_ptp_available(mut self, available: bool) -> Self {
        self.ptp_available = available;
        self
    }
}

impl ClockSource for ChannelClockSource {
    fn next_sample(&mut self, timeout: Duration) -> Option<(i32, PtpSample)> {
        self.samples.recv_timeout(timeout).ok()
    }

    fn update_interest(&mut self, interest: &InterestTable) {
        if let Some(sink) = &self.interest {
            let _ = sink.send(interest.clone());
        }
    }

    fn ptp_available(&self) -> bool {
        self.ptp_available
    }
}
