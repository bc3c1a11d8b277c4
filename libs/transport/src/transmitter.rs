//! Transmitter endpoint

use crate::backend::{QueueSender, SendMode, SharedBackend};
use crate::error::Result;
use std::fmt;
use tracing::debug;

pub struct Transmitter {
    name: String,
    sender: Box<dyn QueueSender>,
}

impl Transmitter {
    /// Opens an existing queue for sending.
    pub fn open(backend: &SharedBackend, name: &str, mode: SendMode) -> Result<Self> {
        let sender = backend.connect(name, mode)?;
        Ok(Self {
            name: name.to_string(),
            sender,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends one whole message.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        self.sender.send(bytes)
    }

    pub fn close(self) {
        debug!("Closed transmitter to {}", self.name);
    }
}

impl fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transmitter").field("name", &self.name).finish()
    }
}
