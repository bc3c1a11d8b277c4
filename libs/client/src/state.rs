//! State shared between the API thread and the listener worker

use codec::{ConnectReply, Message, MessageCodec, Notify, Payload, SubscribeReply, WireBuffer};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace, warn};
use types::{ClockState, EventCounts, MsgAck, SessionId, Subscription, TimeBaseCfg, INVALID_SESSION_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Disconnected,
    Connecting,
    Connected,
}

/// Per-time-base view built from the subscribe reply and later notifications
#[derive(Debug, Clone)]
pub(crate) struct Subscribed {
    pub subscription: Subscription,
    pub state: ClockState,
    /// Transitions since the last `status_wait` return
    pub counts: EventCounts,
    pub updated: bool,
}

#[derive(Debug)]
pub(crate) struct ClientState {
    pub phase: Phase,
    pub session_id: SessionId,
    pub ptp_available: bool,
    pub time_bases: Vec<TimeBaseCfg>,
    pub subscriptions: HashMap<i32, Subscribed>,
    pub connect_reply: Option<(MsgAck, SessionId, ConnectReply)>,
    pub probe_reply: Option<MsgAck>,
    /// Time base and subscription of the Subscribe awaiting its reply
    pub pending_subscription: Option<(i32, Subscription)>,
    pub subscribe_reply: Option<(MsgAck, SubscribeReply)>,
    pub last_traffic: Instant,
}

impl ClientState {
    fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            session_id: INVALID_SESSION_ID,
            ptp_available: false,
            time_bases: Vec::new(),
            subscriptions: HashMap::new(),
            connect_reply: None,
            probe_reply: None,
            pending_subscription: None,
            subscribe_reply: None,
            last_traffic: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn apply(&mut self, message: Message) {
        let (header, payload) = message.into_parts();
        match payload {
            Payload::ConnectReply(reply) => match self.phase {
                Phase::Connecting => {
                    self.connect_reply = Some((header.msg_ack, header.session_id, reply));
                }
                Phase::Connected => self.probe_reply = Some(header.msg_ack),
                Phase::Disconnected => debug!("Connect reply while disconnected, dropped"),
            },
            Payload::SubscribeReply(reply) => {
                if self.owns(header.session_id) {
                    if header.msg_ack == MsgAck::Success {
                        self.record_subscription(&reply);
                    }
                    self.subscribe_reply = Some((header.msg_ack, reply));
                }
            }
            Payload::Notify(notify) => {
                if self.owns(header.session_id) {
                    self.record_notify(notify);
                }
            }
            other => warn!("Unexpected {} on client queue", other.msg_id()),
        }
    }

    fn owns(&self, session_id: SessionId) -> bool {
        let ours = self.phase == Phase::Connected && session_id == self.session_id;
        if !ours {
            warn!(
                "Message for session {} dropped (ours: {})",
                session_id, self.session_id
            );
        }
        ours
    }

    /// Installs the pending subscription before any notification for it can arrive.
    fn record_subscription(&mut self, reply: &SubscribeReply) {
        let Some((index, subscription)) = self.pending_subscription else {
            return;
        };
        if index != reply.time_base_index {
            return;
        }
        self.subscriptions
            .entry(index)
            .and_modify(|entry| entry.state = reply.state)
            .or_insert(Subscribed {
                subscription,
                state: reply.state,
                counts: EventCounts::default(),
                updated: false,
            });
    }

    fn record_notify(&mut self, notify: Notify) {
        let Some(entry) = self.subscriptions.get_mut(&notify.time_base_index) else {
            warn!(
                "Notify for unsubscribed time base {}",
                notify.time_base_index
            );
            return;
        };
        entry.state = notify.state;
        entry.counts.accumulate(&notify.counts);
        entry.updated = true;
    }
}

pub(crate) struct Shared {
    pub state: Mutex<ClientState>,
    pub changed: Condvar,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClientState::new()),
            changed: Condvar::new(),
        }
    }

    /// Decodes one received message and wakes waiters. Runs on the listener worker.
    pub fn dispatch(&self, codec: &MessageCodec, buf: &mut WireBuffer, bytes: &[u8]) {
        let message = match buf.load(bytes).and_then(|_| codec.decode(buf)) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropped malformed message: {}", e);
                return;
            }
        };
        trace!("Received {}", message.describe());

        let mut state = self.state.lock();
        state.last_traffic = Instant::now();
        state.apply(message);
        drop(state);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(message: &Message) -> Vec<u8> {
        let mut buf = WireBuffer::new();
        MessageCodec::encode(message, &mut buf).unwrap();
        buf.as_bytes().to_vec()
    }

    fn connected(shared: &Shared, session_id: SessionId) {
        let mut state = shared.state.lock();
        state.phase = Phase::Connected;
        state.session_id = session_id;
        state.subscriptions.insert(
            1,
            Subscribed {
                subscription: Subscription::default(),
                state: ClockState::default(),
                counts: EventCounts::default(),
                updated: false,
            },
        );
    }

    #[test]
    fn notify_counts_accumulate() {
        let shared = Shared::new();
        connected(&shared, 3);
        let codec = MessageCodec::client();
        let mut buf = WireBuffer::new();

        let notify = Notify {
            time_base_index: 1,
            state: ClockState {
                clock_offset: 12,
                ..Default::default()
            },
            counts: EventCounts {
                offset_in_range: 1,
                ..Default::default()
            },
        };
        let bytes = encoded(&Message::new(notify, MsgAck::None, 3));
        shared.dispatch(&codec, &mut buf, &bytes);
        shared.dispatch(&codec, &mut buf, &bytes);

        let state = shared.state.lock();
        let entry = &state.subscriptions[&1];
        assert!(entry.updated);
        assert_eq!(entry.counts.offset_in_range, 2);
        assert_eq!(entry.state.clock_offset, 12);
    }

    #[test]
    fn foreign_session_is_ignored() {
        let shared = Shared::new();
        connected(&shared, 3);
        let codec = MessageCodec::client();
        let mut buf = WireBuffer::new();

        let bytes = encoded(&Message::new(Notify::default(), MsgAck::None, 4));
        shared.dispatch(&codec, &mut buf, &bytes);
        assert!(!shared.state.lock().subscriptions[&1].updated);
    }

    #[test]
    fn connect_reply_routes_by_phase() {
        let shared = Shared::new();
        let codec = MessageCodec::client();
        let mut buf = WireBuffer::new();
        let bytes = encoded(&Message::new(ConnectReply::default(), MsgAck::Success, 7));

        shared.state.lock().phase = Phase::Connecting;
        shared.dispatch(&codec, &mut buf, &bytes);
        assert_eq!(
            shared.state.lock().connect_reply.as_ref().map(|r| (r.0, r.1)),
            Some((MsgAck::Success, 7))
        );

        connected(&shared, 7);
        shared.dispatch(&codec, &mut buf, &bytes);
        assert_eq!(shared.state.lock().probe_reply, Some(MsgAck::Success));
    }

    #[test]
    fn subscribe_reply_installs_the_subscription() {
        let shared = Shared::new();
        connected(&shared, 5);
        let wanted = Subscription::new(types::EventMask::OFFSET_IN_RANGE);
        shared.state.lock().pending_subscription = Some((2, wanted));
        let codec = MessageCodec::client();
        let mut buf = WireBuffer::new();

        let reply = SubscribeReply {
            time_base_index: 2,
            state: ClockState {
                clock_offset: -40,
                ..Default::default()
            },
        };
        let bytes = encoded(&Message::new(reply, MsgAck::Success, 5));
        shared.dispatch(&codec, &mut buf, &bytes);
        let notify = Notify {
            time_base_index: 2,
            ..Default::default()
        };
        shared.dispatch(&codec, &mut buf, &encoded(&Message::new(notify, MsgAck::None, 5)));

        let state = shared.state.lock();
        let entry = &state.subscriptions[&2];
        assert_eq!(entry.subscription, wanted);
        assert!(entry.updated);
        assert!(state.subscribe_reply.is_some());
    }

    #[test]
    fn garbage_is_dropped() {
        let shared = Shared::new();
        let codec = MessageCodec::client();
        let mut buf = WireBuffer::new();
        shared.dispatch(&codec, &mut buf, &[0xEE, 0, 0, 0]);
        assert!(shared.state.lock().connect_reply.is_none());
    }
}
