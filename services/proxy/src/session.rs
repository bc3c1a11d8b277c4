//! Session table
//!
//! Ids come from a rolling cursor with linear probing over the whole `u16`
//! space except [`INVALID_SESSION_ID`]. Ids are reused after removal, so
//! every Subscribe and Disconnect is checked against the client identity
//! cached at connect time before it is acted on.

use crate::error::{ProxyError, Result};
use crate::tracker::EventTracker;
use std::collections::HashMap;
use tracing::debug;
use transport::Transmitter;
use types::{SessionId, INVALID_SESSION_ID};

pub struct Session {
    id: SessionId,
    client_id: String,
    transmitter: Transmitter,
    trackers: HashMap<i32, EventTracker>,
    send_failures: u32,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Listen queue name the client connected with
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    pub fn tracker(&self, time_base_index: i32) -> Option<&EventTracker> {
        self.trackers.get(&time_base_index)
    }

    pub fn tracker_mut(&mut self, time_base_index: i32) -> Option<&mut EventTracker> {
        self.trackers.get_mut(&time_base_index)
    }

    pub fn add_tracker(&mut self, time_base_index: i32, tracker: EventTracker) {
        self.trackers.insert(time_base_index, tracker);
    }

    pub fn trackers(&self) -> impl Iterator<Item = (i32, &EventTracker)> {
        self.trackers.iter().map(|(index, tracker)| (*index, tracker))
    }

    pub fn trackers_mut(&mut self) -> impl Iterator<Item = (i32, &mut EventTracker)> {
        self.trackers.iter_mut().map(|(index, tracker)| (*index, tracker))
    }

    /// Counts a failed transmit and returns the consecutive total.
    pub fn record_send_failure(&mut self) -> u32 {
        self.send_failures += 1;
        self.send_failures
    }

    pub fn record_send_success(&mut self) {
        self.send_failures = 0;
    }
}

pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    cursor: SessionId,
    capacity: usize,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self::starting_at(capacity, 0)
    }

    /// Table whose first probe starts at `cursor`
    pub fn starting_at(capacity: usize, cursor: SessionId) -> Self {
        Self {
            sessions: HashMap::new(),
            cursor,
            capacity,
        }
    }

    /// Allocates the next free id and stores the session under it.
    pub fn create_session(
        &mut self,
        client_id: impl Into<String>,
        transmitter: Transmitter,
    ) -> Result<SessionId> {
        if self.sessions.len() >= self.capacity {
            return Err(ProxyError::SessionsExhausted {
                capacity: self.capacity,
            });
        }
        let id = self.next_free_id().ok_or(ProxyError::SessionsExhausted {
            capacity: self.capacity,
        })?;
        self.cursor = id.wrapping_add(1);

        let client_id = client_id.into();
        debug!("Session {} created for {}", id, client_id);
        self.sessions.insert(
            id,
            Session {
                id,
                client_id,
                transmitter,
                trackers: HashMap::new(),
                send_failures: 0,
            },
        );
        Ok(id)
    }

    fn next_free_id(&self) -> Option<SessionId> {
        let mut candidate = self.cursor;
        for _ in 0..=u16::MAX {
            if candidate != INVALID_SESSION_ID && !self.sessions.contains_key(&candidate) {
                return Some(candidate);
            }
            candidate = candidate.wrapping_add(1);
        }
        None
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Looks up `id` and checks it still belongs to `client_id`.
    pub fn validate(&mut self, id: SessionId, client_id: &str) -> Result<&mut Session> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(ProxyError::UnknownSession { session_id: id })?;
        if session.client_id != client_id {
            return Err(ProxyError::ClientMismatch {
                session_id: id,
                expected: session.client_id.clone(),
                received: client_id.to_string(),
            });
        }
        Ok(session)
    }

    pub fn find_by_client(&self, client_id: &str) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|session| session.client_id == client_id)
            .map(Session::id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            debug!("Session {} removed", id);
        }
        removed
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
