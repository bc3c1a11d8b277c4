//! Queue backend abstraction
//!
//! A backend creates named, bounded, message-oriented queues. Every message
//! fits in one queue slot of `MAX_MESSAGE_SIZE` bytes and is delivered whole,
//! in FIFO order.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Blocking behaviour of a transmitter when the peer queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Blocking,
    /// A full queue fails with `QueueFull` instead of waiting
    NonBlocking,
}

/// Wakes a worker blocked in [`QueueReceiver::receive`]
pub trait Interrupt: Send + Sync {
    fn interrupt(&self) -> Result<()>;
}

/// Receiving end of a queue, owned by exactly one worker thread
pub trait QueueReceiver: Send {
    /// Blocks until a message arrives.
    ///
    /// Returns `Err(TransportError::Interrupted)` when woken by the
    /// interrupter; callers treat that like a zero-length receive.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Runs on the worker thread before its first receive.
    fn attach_current_thread(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs on the worker thread after its last receive.
    fn detach_current_thread(&mut self) {}

    fn interrupter(&self) -> Arc<dyn Interrupt>;
}

/// Sending end of a queue
pub trait QueueSender: Send + Sync {
    fn send(&self, bytes: &[u8]) -> Result<()>;
}

pub trait QueueBackend: Send + Sync + fmt::Debug {
    /// Short backend name for logs
    fn kind(&self) -> &'static str;

    /// Creates (or reopens) the named queue for receiving.
    fn listen(&self, name: &str, max_outstanding: usize) -> Result<Box<dyn QueueReceiver>>;

    /// Opens an existing queue for sending.
    fn connect(&self, name: &str, mode: SendMode) -> Result<Box<dyn QueueSender>>;

    /// Removes the queue name; open handles keep working.
    fn unlink(&self, name: &str) -> Result<()>;
}

/// Shared handle to a backend
pub type SharedBackend = Arc<dyn QueueBackend>;
