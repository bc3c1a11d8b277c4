//! Listener endpoint and its receive worker
//!
//! ```text
//! open(name) ──► Listener ──spawn(handler)──► ListenerHandle
//!                                              │
//!                     worker thread: loop {    │ stop(): flag + interrupt
//!                       check stop flag        │ finalize(): bounded join,
//!                       receive_blocking       │   unlink queue
//!                       handler(bytes)         │
//!                     }                        │
//! ```
//!
//! Zero-length receives and interrupts keep the loop going. Any other
//! receive error ends it and is returned by `finalize`.

use crate::backend::{Interrupt, QueueReceiver, SharedBackend};
use crate::error::{Result, TransportError};
use crate::worker::{StopFlag, Worker, SHUTDOWN_TIMEOUT};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use types::MAX_MESSAGE_SIZE;

pub struct Listener {
    name: String,
    backend: SharedBackend,
    receiver: Box<dyn QueueReceiver>,
}

impl Listener {
    /// Creates the named queue with room for `max_outstanding` messages.
    pub fn open(backend: &SharedBackend, name: &str, max_outstanding: usize) -> Result<Self> {
        let receiver = backend.listen(name, max_outstanding)?;
        Ok(Self {
            name: name.to_string(),
            backend: Arc::clone(backend),
            receiver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks for the next message. Interrupts surface as `Interrupted`.
    pub fn receive_blocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.receiver.receive(buf)
    }

    pub fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.receiver.interrupter()
    }

    /// Closes the queue and removes its name.
    pub fn close(self) -> Result<()> {
        let Listener {
            name,
            backend,
            receiver,
        } = self;
        drop(receiver);
        backend.unlink(&name)
    }

    /// Moves the listener onto its own worker thread.
    ///
    /// `handler` runs on the worker for every received message.
    pub fn spawn<H>(self, mut handler: H) -> Result<ListenerHandle>
    where
        H: FnMut(&[u8]) + Send + 'static,
    {
        let Listener {
            name,
            backend,
            mut receiver,
        } = self;
        let interrupter = receiver.interrupter();
        let queue = name.clone();

        let worker = Worker::spawn(format!("listen{name}"), move |stop: StopFlag| {
            receiver.attach_current_thread()?;
            let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
            let outcome = loop {
                if stop.is_set() {
                    break Ok(());
                }
                match receiver.receive(&mut buf) {
                    Ok(0) | Err(TransportError::Interrupted) => continue,
                    Ok(len) => handler(&buf[..len]),
                    Err(e) => {
                        error!("Listener {} receive failed: {}", queue, e);
                        break Err(e);
                    }
                }
            };
            receiver.detach_current_thread();
            outcome
        })?;

        info!("Listener worker started on {}", name);
        Ok(ListenerHandle {
            name,
            backend,
            interrupter,
            worker,
        })
    }
}

/// Running listener worker
pub struct ListenerHandle {
    name: String,
    backend: SharedBackend,
    interrupter: Arc<dyn Interrupt>,
    worker: Worker,
}

impl ListenerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests the worker to stop and wakes it if it is blocked.
    pub fn stop(&self) {
        self.worker.request_stop();
        self.interrupt();
    }

    pub fn interrupt(&self) {
        if let Err(e) = self.interrupter.interrupt() {
            warn!("Interrupt of listener {} failed: {}", self.name, e);
        }
    }

    /// True once the worker thread has exited, whether stopped or failed.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Joins the worker within [`SHUTDOWN_TIMEOUT`] and removes the queue name.
    ///
    /// Returns the worker's receive error if the loop ended on its own, or
    /// `ShutdownTimeout` if it could not be joined in time.
    pub fn finalize(self) -> Result<()> {
        let ListenerHandle {
            name,
            backend,
            interrupter,
            worker,
        } = self;
        let joined = worker.finalize_with(SHUTDOWN_TIMEOUT, || {
            if let Err(e) = interrupter.interrupt() {
                debug!("Interrupt of listener {} failed: {}", name, e);
            }
        });
        if let Err(e) = backend.unlink(&name) {
            warn!("Failed to unlink {}: {}", name, e);
        }
        joined
    }
}
