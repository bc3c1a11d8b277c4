use crate::error::{ClientError, Result};
use crate::options::ClientOptions;
use crate::state::{ClientState, Phase, Shared};
use codec::{
    ConnectRequest, Disconnect, Message, MessageCodec, SubscribeRequest, WireBuffer,
};
use config::constants::queues::CLIENT_QUEUE_DEPTH;
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use transport::{Listener, ListenerHandle, SendMode, SharedBackend, Transmitter};
use types::{
    ClockState, EventCounts, MsgAck, SessionId, Subscription, TimeBaseCfg, INVALID_SESSION_ID,
};

/// Outcome of [`ClockClient::status_wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A notification arrived; `counts` holds the transitions since the previous return
    Updated {
        state: ClockState,
        counts: EventCounts,
    },
    Timeout,
    /// The proxy stopped answering or rejected the liveness probe
    Disconnected,
}

impl WaitStatus {
    /// `1`, `0` or `-1`, in that order of variants
    pub fn code(&self) -> i32 {
        match self {
            Self::Updated { .. } => 1,
            Self::Timeout => 0,
            Self::Disconnected => -1,
        }
    }
}

/// One connection to the proxy
pub struct ClockClient {
    options: ClientOptions,
    backend: SharedBackend,
    client_id: String,
    shared: Arc<Shared>,
    listener: Option<ListenerHandle>,
    transmitter: Option<Transmitter>,
    tx_buf: WireBuffer,
}

impl ClockClient {
    pub fn new(backend: SharedBackend, options: ClientOptions) -> Self {
        let client_id = options.client_queue_name();
        Self {
            options,
            backend,
            client_id,
            shared: Arc::new(Shared::new()),
            listener: None,
            transmitter: None,
            tx_buf: WireBuffer::new(),
        }
    }

    /// Name of this client's listen queue, sent as its identity
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().phase == Phase::Connected
    }

    pub fn session_id(&self) -> Option<SessionId> {
        let state = self.shared.state.lock();
        (state.phase == Phase::Connected).then_some(state.session_id)
    }

    /// Time-base table advertised in the connect reply
    pub fn time_bases(&self) -> Vec<TimeBaseCfg> {
        self.shared.state.lock().time_bases.clone()
    }

    pub fn ptp_available(&self) -> bool {
        self.shared.state.lock().ptp_available
    }

    pub fn subscription(&self, time_base_index: i32) -> Option<Subscription> {
        self.shared
            .state
            .lock()
            .subscriptions
            .get(&time_base_index)
            .map(|entry| entry.subscription)
    }

    /// Opens the listen queue, announces it to the proxy and waits for a session id.
    ///
    /// On timeout or rejection everything opened here is torn down again and
    /// the client stays disconnected; the call may be retried.
    pub fn connect(&mut self) -> Result<SessionId> {
        {
            let state = self.shared.state.lock();
            if state.phase != Phase::Disconnected {
                return Err(ClientError::AlreadyConnected {
                    session_id: state.session_id,
                });
            }
        }

        let listener = Listener::open(&self.backend, &self.client_id, CLIENT_QUEUE_DEPTH)?;
        let shared = Arc::clone(&self.shared);
        let codec = MessageCodec::client();
        let mut rx_buf = WireBuffer::new();
        self.listener = Some(listener.spawn(move |bytes| {
            shared.dispatch(&codec, &mut rx_buf, bytes);
        })?);

        match Transmitter::open(&self.backend, &self.options.proxy_queue, SendMode::Blocking) {
            Ok(transmitter) => self.transmitter = Some(transmitter),
            Err(e) => {
                self.teardown()?;
                return Err(e.into());
            }
        }

        {
            let mut state = self.shared.state.lock();
            state.phase = Phase::Connecting;
            state.connect_reply = None;
        }
        let request = ConnectRequest {
            client_id: self.client_id.clone(),
        };
        if let Err(e) = self.send(Message::request(request, INVALID_SESSION_ID)) {
            self.teardown()?;
            return Err(e);
        }

        let timeout = self.options.connect_timeout;
        let reply = self.wait_for(timeout, |state| state.connect_reply.take());
        match reply {
            Some((MsgAck::Success, session_id, body)) => {
                let mut state = self.shared.state.lock();
                state.phase = Phase::Connected;
                state.session_id = session_id;
                state.ptp_available = body.ptp_available;
                state.time_bases = body.time_bases;
                state.last_traffic = Instant::now();
                info!(
                    "Connected to {} as session {} ({} time bases)",
                    self.options.proxy_queue,
                    session_id,
                    state.time_bases.len()
                );
                Ok(session_id)
            }
            Some((ack, _, _)) => {
                debug!("Connect answered with {:?}", ack);
                self.teardown()?;
                Err(ClientError::Rejected {
                    operation: "connect",
                })
            }
            None => {
                self.teardown()?;
                Err(ClientError::timeout("connect", timeout))
            }
        }
    }

    /// Subscribes to events on one time base and returns its current state.
    pub fn subscribe(&mut self, time_base_index: i32, subscription: Subscription) -> Result<ClockState> {
        let session_id = self.require_connected()?;
        {
            let mut state = self.shared.state.lock();
            state.subscribe_reply = None;
            state.pending_subscription = Some((time_base_index, subscription));
        }

        let request = SubscribeRequest {
            client_id: self.client_id.clone(),
            time_base_index,
            subscription,
        };
        let sent = self.send(Message::request(request, session_id));
        let timeout = self.options.subscribe_timeout;
        let reply = match sent {
            Ok(()) => self.wait_for(timeout, |state| state.subscribe_reply.take()),
            Err(e) => {
                self.shared.state.lock().pending_subscription = None;
                return Err(e);
            }
        };
        self.shared.state.lock().pending_subscription = None;

        match reply {
            Some((MsgAck::Success, reply)) => {
                debug!("Subscribed to time base {}: {}", time_base_index, reply.state);
                Ok(reply.state)
            }
            Some(_) => Err(ClientError::Rejected {
                operation: "subscribe",
            }),
            None => Err(ClientError::timeout("subscribe", timeout)),
        }
    }

    /// Waits up to `timeout` for a notification on `time_base_index`.
    ///
    /// Returns at once when transitions are already pending. After the
    /// liveness interval without traffic the proxy is probed; a failed probe
    /// tears the connection down and yields [`WaitStatus::Disconnected`].
    pub fn status_wait(&mut self, time_base_index: i32, timeout: Duration) -> Result<WaitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut state = self.shared.state.lock();
            if state.phase != Phase::Connected {
                return Ok(WaitStatus::Disconnected);
            }
            let entry = state
                .subscriptions
                .get_mut(&time_base_index)
                .ok_or(ClientError::NotSubscribed {
                    index: time_base_index,
                })?;
            if entry.updated {
                entry.updated = false;
                return Ok(WaitStatus::Updated {
                    state: entry.state,
                    counts: entry.counts.take(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(WaitStatus::Timeout);
            }
            let probe_at = state.last_traffic + self.options.liveness_interval;
            if now >= probe_at {
                drop(state);
                if !self.probe()? {
                    return Ok(WaitStatus::Disconnected);
                }
                continue;
            }
            let _ = self.shared.changed.wait_until(&mut state, deadline.min(probe_at));
        }
    }

    /// Sends Disconnect if possible, then tears the connection down regardless.
    pub fn disconnect(&mut self) -> Result<()> {
        let session_id = self.shared.state.lock().session_id;
        if self.transmitter.is_some() && session_id != INVALID_SESSION_ID {
            let request = Disconnect {
                client_id: self.client_id.clone(),
            };
            if let Err(e) = self.send(Message::request(request, session_id)) {
                warn!("Disconnect of session {} not delivered: {}", session_id, e);
            }
        }
        self.teardown()?;
        info!("Disconnected session {}", session_id);
        Ok(())
    }

    /// Sends a liveness probe; returns whether the proxy still knows us.
    fn probe(&mut self) -> Result<bool> {
        let session_id = self.require_connected()?;
        self.shared.state.lock().probe_reply = None;

        let request = ConnectRequest {
            client_id: self.client_id.clone(),
        };
        let sent = self.send(Message::request(request, session_id));
        let reply = match sent {
            Ok(()) => self.wait_for(self.options.liveness_timeout, |state| state.probe_reply.take()),
            Err(e) => {
                warn!("Liveness probe not sent: {}", e);
                None
            }
        };
        if reply == Some(MsgAck::Success) {
            self.shared.state.lock().last_traffic = Instant::now();
            return Ok(true);
        }

        warn!(
            "Proxy did not confirm session {} ({:?}), dropping connection",
            session_id, reply
        );
        self.teardown()?;
        Ok(false)
    }

    fn require_connected(&self) -> Result<SessionId> {
        let state = self.shared.state.lock();
        if state.phase == Phase::Connected {
            Ok(state.session_id)
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn send(&mut self, message: Message) -> Result<()> {
        let transmitter = self.transmitter.as_ref().ok_or(ClientError::NotConnected)?;
        MessageCodec::encode(&message, &mut self.tx_buf)?;
        debug!("Sending {}", message.describe());
        transmitter.send(self.tx_buf.as_bytes())?;
        Ok(())
    }

    /// Waits on the condition variable until `take` yields or the timeout passes.
    fn wait_for<T>(
        &self,
        timeout: Duration,
        mut take: impl FnMut(&mut MutexGuard<'_, ClientState>) -> Option<T>,
    ) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(value) = take(&mut state) {
                return Some(value);
            }
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return take(&mut state);
            }
        }
    }

    /// Stops the listener worker, removes the listen queue and forgets the session.
    fn teardown(&mut self) -> Result<()> {
        if let Some(transmitter) = self.transmitter.take() {
            transmitter.close();
        }
        self.shared.state.lock().reset();
        self.shared.changed.notify_all();
        match self.listener.take() {
            Some(listener) => listener
                .finalize()
                .map_err(|source| ClientError::Shutdown { source }),
            None => Ok(()),
        }
    }
}

impl Drop for ClockClient {
    fn drop(&mut self) {
        if self.listener.is_some() || self.transmitter.is_some() {
            if let Err(e) = self.disconnect() {
                warn!("Disconnect on drop failed: {}", e);
            }
        }
    }
}
