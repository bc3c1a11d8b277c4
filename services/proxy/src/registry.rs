//! Session table plus everything derived from it
//!
//! Dispatch and the notifier both reach sessions, so the registry lives
//! behind one mutex. It is the only writer of the ClockConfiguration
//! exchange: every change to the set of subscriptions republishes the
//! interest table.

use crate::session::{Session, SessionTable};
use crate::status::{InterestTable, StatusTable};
use codec::{Message, MessageCodec, Notify, WireBuffer};
use exchange::Producer;
use tracing::{debug, warn};
use transport::TransportError;
use types::{MsgAck, SessionId};

pub struct Registry {
    sessions: SessionTable,
    interest: Producer<InterestTable>,
    time_bases: usize,
    max_send_failures: u32,
}

impl Registry {
    pub fn new(
        sessions: SessionTable,
        interest: Producer<InterestTable>,
        time_bases: usize,
        max_send_failures: u32,
    ) -> Self {
        Self {
            sessions,
            interest,
            time_bases,
            max_send_failures,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionTable {
        &mut self.sessions
    }

    /// Removes a session and withdraws its interest.
    pub fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            self.publish_interest();
        }
        removed
    }

    /// Recomputes the interest table from every live tracker.
    pub fn publish_interest(&mut self) {
        let mut table = InterestTable::new(self.time_bases);
        for session in self.sessions.iter() {
            for (index, tracker) in session.trackers() {
                table.add(index, tracker.subscription().event_mask);
            }
        }
        if self.interest.publish(table) {
            debug!("Interest table republished");
        }
    }

    /// Evaluates `status` for every subscription and sends the resulting notifications.
    ///
    /// A full client queue drops the notification but keeps its counts for
    /// the next one. Other transmit failures count against the session,
    /// which is destroyed after `max_send_failures` in a row.
    pub fn broadcast(&mut self, status: &StatusTable, buf: &mut WireBuffer) -> usize {
        let mut sent = 0;
        let mut failed = Vec::new();

        for session in self.sessions.iter_mut() {
            let id = session.id();
            let mut outgoing = Vec::new();
            for (index, tracker) in session.trackers_mut() {
                if let Some(sample) = status.get(index) {
                    if let Some((state, counts)) = tracker.evaluate(sample) {
                        outgoing.push(Notify {
                            time_base_index: index,
                            state,
                            counts,
                        });
                    }
                }
            }

            for notify in outgoing {
                let index = notify.time_base_index;
                let message = Message::new(notify, MsgAck::None, id);
                if let Err(e) = MessageCodec::encode(&message, buf) {
                    warn!("Notify for session {} not encodable: {}", id, e);
                    continue;
                }
                let delivered = match session.transmitter().send(buf.as_bytes()) {
                    Ok(()) => {
                        session.record_send_success();
                        sent += 1;
                        true
                    }
                    Err(TransportError::QueueFull { .. }) => {
                        debug!("Session {} queue full, notification deferred", id);
                        false
                    }
                    Err(e) => {
                        let failures = session.record_send_failure();
                        warn!(
                            "Notify to session {} failed ({}/{}): {}",
                            id, failures, self.max_send_failures, e
                        );
                        if failures >= self.max_send_failures {
                            failed.push(id);
                        }
                        false
                    }
                };
                if let Some(tracker) = session.tracker_mut(index) {
                    if delivered {
                        tracker.delivered();
                    } else {
                        tracker.undelivered();
                    }
                }
            }
        }

        failed.sort_unstable();
        failed.dedup();
        for id in failed {
            warn!("Destroying session {} after repeated send failures", id);
            self.remove_session(id);
        }
        sent
    }

    /// Drops every session, closing their transmitters.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.publish_interest();
    }
}
