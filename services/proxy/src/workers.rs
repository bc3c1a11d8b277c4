//! Monitor and notifier thread bodies
//!
//! Both loops block only for bounded intervals, so setting the stop flag is
//! enough to end them within the shutdown bound.

use crate::registry::Registry;
use crate::source::ClockSource;
use crate::status::{InterestTable, StatusTable};
use codec::WireBuffer;
use exchange::{Consumer, Producer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use transport::StopFlag;

/// Feeds interest to the clock source and publishes its samples.
pub fn run_monitor(
    stop: StopFlag,
    mut source: Box<dyn ClockSource>,
    mut status: Producer<StatusTable>,
    mut interest: Consumer<InterestTable>,
    poll: Duration,
) -> transport::Result<()> {
    debug!("Monitor started");
    while !stop.is_set() {
        if let Some(table) = interest.consume(Duration::ZERO) {
            source.update_interest(table);
        }
        let Some((index, sample)) = source.next_sample(poll) else {
            continue;
        };
        let mut guard = status.produce();
        if guard.set(index, sample) {
            guard.commit();
        } else {
            trace!("Sample for time base {} unchanged or unknown", index);
        }
    }
    debug!("Monitor stopped");
    Ok(())
}

/// Waits for status commits and fans them out to every session.
pub fn run_notifier(
    stop: StopFlag,
    registry: Arc<Mutex<Registry>>,
    mut status: Consumer<StatusTable>,
    poll: Duration,
) -> transport::Result<()> {
    debug!("Notifier started");
    let mut buf = WireBuffer::new();
    while !stop.is_set() {
        let Some(table) = status.consume(poll) else {
            continue;
        };
        let sent = registry.lock().broadcast(table, &mut buf);
        if sent > 0 {
            trace!("Sent {} notifications", sent);
        }
    }
    debug!("Notifier stopped");
    Ok(())
}
