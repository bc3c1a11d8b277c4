//! In-process queue backend
//!
//! Named bounded channels with the same semantics as the POSIX backend:
//! whole messages, FIFO, a bounded depth, and open-by-name. Used by tests and
//! by embedders that run the proxy and its clients in one process. A blocked
//! receive is cancelled through a wake channel instead of a signal.

use crate::backend::{Interrupt, QueueBackend, QueueReceiver, QueueSender, SendMode};
use crate::error::{Result, TransportError};
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use types::MAX_MESSAGE_SIZE;

const BACKEND: &str = "local";

#[derive(Clone)]
struct LocalQueue {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

#[derive(Clone, Default)]
pub struct LocalBackend {
    queues: Arc<Mutex<HashMap<String, LocalQueue>>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a queue with this name currently exists
    pub fn exists(&self, name: &str) -> bool {
        self.queues.lock().contains_key(name)
    }
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.lock();
        f.debug_struct("LocalBackend")
            .field("queues", &queues.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl QueueBackend for LocalBackend {
    fn kind(&self) -> &'static str {
        BACKEND
    }

    fn listen(&self, name: &str, max_outstanding: usize) -> Result<Box<dyn QueueReceiver>> {
        if max_outstanding == 0 {
            return Err(TransportError::open(name, "queue depth must be positive"));
        }
        let queue = self
            .queues
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = bounded(max_outstanding);
                LocalQueue { tx, rx }
            })
            .clone();
        let (wake_tx, wake_rx) = bounded(1);
        debug!("Local queue listening on: {}", name);
        Ok(Box::new(LocalReceiver {
            rx: queue.rx,
            _keepalive: queue.tx,
            wake_tx,
            wake_rx,
        }))
    }

    fn connect(&self, name: &str, mode: SendMode) -> Result<Box<dyn QueueSender>> {
        let queue = self
            .queues
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::open(name, "no such queue"))?;
        Ok(Box::new(LocalSender {
            name: name.to_string(),
            tx: queue.tx,
            mode,
        }))
    }

    fn unlink(&self, name: &str) -> Result<()> {
        self.queues.lock().remove(name);
        Ok(())
    }
}

struct Wake {
    tx: Sender<()>,
}

impl Interrupt for Wake {
    fn interrupt(&self) -> Result<()> {
        // a full wake channel already has a pending interrupt
        let _ = self.tx.try_send(());
        Ok(())
    }
}

struct LocalReceiver {
    rx: Receiver<Vec<u8>>,
    /// Holds the channel open so receives block rather than fail once every
    /// transmitter is gone, matching queue semantics.
    _keepalive: Sender<Vec<u8>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl QueueReceiver for LocalReceiver {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        // A pending interrupt wins over queued data so a stop is never starved.
        match self.wake_rx.try_recv() {
            Ok(()) => return Err(TransportError::Interrupted),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
        let message = select! {
            recv(self.rx) -> msg => msg,
            recv(self.wake_rx) -> _ => return Err(TransportError::Interrupted),
        };
        let message = message.map_err(|e| TransportError::receive_with_source("local", "channel", e))?;
        if message.len() > buf.len() {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                limit: buf.len(),
            });
        }
        buf[..message.len()].copy_from_slice(&message);
        Ok(message.len())
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        Arc::new(Wake {
            tx: self.wake_tx.clone(),
        })
    }
}

struct LocalSender {
    name: String,
    tx: Sender<Vec<u8>>,
    mode: SendMode,
}

impl QueueSender for LocalSender {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: bytes.len(),
                limit: MAX_MESSAGE_SIZE,
            });
        }
        let closed = || TransportError::Closed {
            name: self.name.clone(),
        };
        match self.mode {
            SendMode::Blocking => self.tx.send(bytes.to_vec()).map_err(|_| closed()),
            SendMode::NonBlocking => match self.tx.try_send(bytes.to_vec()) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(TransportError::QueueFull {
                    name: self.name.clone(),
                }),
                Err(TrySendError::Disconnected(_)) => Err(closed()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_arrive_whole_and_in_order() {
        let backend = LocalBackend::new();
        let mut rx = backend.listen("/q", 4).unwrap();
        let tx = backend.connect("/q", SendMode::Blocking).unwrap();
        tx.send(b"first").unwrap();
        tx.send(b"second").unwrap();

        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = rx.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = rx.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[test]
    fn connect_to_missing_queue_fails() {
        let backend = LocalBackend::new();
        assert!(matches!(
            backend.connect("/nobody", SendMode::Blocking),
            Err(TransportError::Open { .. })
        ));
    }

    #[test]
    fn non_blocking_send_reports_full_queue() {
        let backend = LocalBackend::new();
        let _rx = backend.listen("/small", 1).unwrap();
        let tx = backend.connect("/small", SendMode::NonBlocking).unwrap();
        tx.send(b"a").unwrap();
        assert!(matches!(
            tx.send(b"b"),
            Err(TransportError::QueueFull { .. })
        ));
    }

    #[test]
    fn oversized_message_rejected() {
        let backend = LocalBackend::new();
        let _rx = backend.listen("/big", 1).unwrap();
        let tx = backend.connect("/big", SendMode::Blocking).unwrap();
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            tx.send(&payload),
            Err(TransportError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn interrupt_wakes_blocked_receive() {
        let backend = LocalBackend::new();
        let mut rx = backend.listen("/idle", 1).unwrap();
        let waker = rx.interrupter();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 16];
            rx.receive(&mut buf)
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        waker.interrupt().unwrap();
        assert!(matches!(
            handle.join().unwrap(),
            Err(TransportError::Interrupted)
        ));
    }

    #[test]
    fn unlink_removes_name_but_not_open_receiver() {
        let backend = LocalBackend::new();
        let mut rx = backend.listen("/gone", 2).unwrap();
        let tx = backend.connect("/gone", SendMode::Blocking).unwrap();
        backend.unlink("/gone").unwrap();
        assert!(!backend.exists("/gone"));
        tx.send(b"late").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(rx.receive(&mut buf).unwrap(), 4);
    }
}
