//! Message dispatch on the proxy listener thread
//!
//! One dispatcher per proxy, driven by its single listener worker, so
//! requests are handled strictly one at a time. The registry mutex only
//! serializes dispatch against the notifier thread.

use crate::error::{ProxyError, Result};
use crate::registry::Registry;
use crate::status::ClockStatus;
use crate::tracker::EventTracker;
use codec::{
    ConnectReply, ConnectRequest, Disconnect, Message, MessageCodec, Payload, SubscribeReply,
    SubscribeRequest, WireBuffer,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use transport::{SendMode, SharedBackend, Transmitter};
use types::{ClockState, MsgAck, SessionId, TimeBaseCfg, INVALID_SESSION_ID};

/// Bound on reading the status snapshot while answering a subscribe
const SNAPSHOT_TIMEOUT: Duration = Duration::from_millis(20);

pub struct Dispatcher {
    codec: MessageCodec,
    rx_buf: WireBuffer,
    tx_buf: WireBuffer,
    backend: SharedBackend,
    registry: Arc<Mutex<Registry>>,
    status: ClockStatus,
    time_bases: Vec<TimeBaseCfg>,
    ptp_available: bool,
}

impl Dispatcher {
    pub fn new(
        backend: SharedBackend,
        registry: Arc<Mutex<Registry>>,
        status: ClockStatus,
        time_bases: Vec<TimeBaseCfg>,
        ptp_available: bool,
    ) -> Self {
        Self {
            codec: MessageCodec::proxy(),
            rx_buf: WireBuffer::new(),
            tx_buf: WireBuffer::new(),
            backend,
            registry,
            status,
            time_bases,
            ptp_available,
        }
    }

    /// Decodes and handles one message from the proxy queue.
    ///
    /// An error means the message was dropped; the proxy carries on.
    pub fn handle(&mut self, bytes: &[u8]) -> Result<()> {
        self.rx_buf.load(bytes)?;
        let message = self.codec.decode(&mut self.rx_buf)?;
        debug!("Dispatching {}", message.describe());

        let session_id = message.session_id();
        match message.into_parts().1 {
            Payload::ConnectRequest(request) if session_id == INVALID_SESSION_ID => {
                self.on_connect(request)
            }
            Payload::ConnectRequest(request) => self.on_probe(session_id, request),
            Payload::SubscribeRequest(request) => self.on_subscribe(session_id, request),
            Payload::Disconnect(request) => self.on_disconnect(session_id, request),
            other => Err(ProxyError::UnexpectedMessage {
                msg_id: other.msg_id(),
            }),
        }
    }

    fn connect_reply(&self) -> ConnectReply {
        ConnectReply {
            ptp_available: self.ptp_available,
            time_bases: self.time_bases.clone(),
        }
    }

    fn on_connect(&mut self, request: ConnectRequest) -> Result<()> {
        let transmitter =
            Transmitter::open(&self.backend, &request.client_id, SendMode::NonBlocking)?;

        let mut registry = self.registry.lock();
        if let Some(stale) = registry.sessions().find_by_client(&request.client_id) {
            info!(
                "{} reconnected, dropping its old session {}",
                request.client_id, stale
            );
            registry.remove_session(stale);
        }

        let created = registry
            .sessions_mut()
            .create_session(request.client_id.clone(), transmitter);
        match created {
            Ok(session_id) => {
                let reply = Message::new(self.connect_reply(), MsgAck::Success, session_id);
                let Some(session) = registry.sessions().get(session_id) else {
                    return Err(ProxyError::UnknownSession { session_id });
                };
                send(&mut self.tx_buf, session.transmitter(), &reply)?;
                info!("Session {} connected: {}", session_id, request.client_id);
                Ok(())
            }
            Err(e) => {
                drop(registry);
                warn!("Refusing {}: {}", request.client_id, e);
                let refusal = Transmitter::open(&self.backend, &request.client_id, SendMode::NonBlocking)?;
                let reply = Message::new(ConnectReply::default(), MsgAck::Fail, INVALID_SESSION_ID);
                send(&mut self.tx_buf, &refusal, &reply)?;
                Err(e)
            }
        }
    }

    /// A Connect carrying a live session id asks whether that session still exists.
    fn on_probe(&mut self, session_id: SessionId, request: ConnectRequest) -> Result<()> {
        let mut registry = self.registry.lock();
        match registry.sessions_mut().validate(session_id, &request.client_id) {
            Ok(session) => {
                trace!("Liveness probe from session {}", session_id);
                let reply = Message::new(self.connect_reply(), MsgAck::Success, session_id);
                send(&mut self.tx_buf, session.transmitter(), &reply)
            }
            Err(e) => {
                drop(registry);
                // the session is gone, answer on a one-off transmitter
                let transmitter =
                    Transmitter::open(&self.backend, &request.client_id, SendMode::NonBlocking)?;
                let reply = Message::new(ConnectReply::default(), MsgAck::Fail, session_id);
                send(&mut self.tx_buf, &transmitter, &reply)?;
                Err(e)
            }
        }
    }

    fn on_subscribe(&mut self, session_id: SessionId, request: SubscribeRequest) -> Result<()> {
        let index = request.time_base_index;
        let known = self.time_bases.iter().any(|tb| tb.index == index);
        let sample = self
            .status
            .snapshot(SNAPSHOT_TIMEOUT)
            .and_then(|table| table.get(index).copied());

        let mut registry = self.registry.lock();
        let session = registry
            .sessions_mut()
            .validate(session_id, &request.client_id)?;

        let verdict = if !known {
            Err(ProxyError::UnknownTimeBase { index })
        } else {
            match session.tracker(index) {
                Some(existing) if *existing.subscription() == request.subscription => {
                    debug!("Session {} repeated its subscription to {}", session_id, index);
                    Ok(*existing.state())
                }
                Some(_) => Err(ProxyError::SubscriptionConflict { session_id, index }),
                None => {
                    let tracker = EventTracker::primed(request.subscription, sample.as_ref());
                    let state = *tracker.state();
                    session.add_tracker(index, tracker);
                    Ok(state)
                }
            }
        };

        let (ack, state) = match &verdict {
            Ok(state) => (MsgAck::Success, *state),
            Err(_) => (MsgAck::Fail, ClockState::default()),
        };
        let reply = Message::new(
            SubscribeReply {
                time_base_index: index,
                state,
            },
            ack,
            session_id,
        );
        let sent = send(&mut self.tx_buf, session.transmitter(), &reply);

        // the tracker stays installed even if the reply is lost
        if verdict.is_ok() {
            info!(
                "Session {} subscribed to time base {} ({})",
                session_id, index, request.subscription.event_mask
            );
            registry.publish_interest();
        }
        sent?;
        verdict.map(|_| ())
    }

    fn on_disconnect(&mut self, session_id: SessionId, request: Disconnect) -> Result<()> {
        let mut registry = self.registry.lock();
        registry
            .sessions_mut()
            .validate(session_id, &request.client_id)?;
        registry.remove_session(session_id);
        info!("Session {} disconnected", session_id);
        Ok(())
    }
}

fn send(buf: &mut WireBuffer, transmitter: &Transmitter, message: &Message) -> Result<()> {
    MessageCodec::encode(message, buf)?;
    transmitter.send(buf.as_bytes())?;
    Ok(())
}
