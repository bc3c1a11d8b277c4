//! POSIX message queue backend
//!
//! Listen queues are created `O_RDONLY | O_CREAT` with mode `0o620` and a
//! message size of `MAX_MESSAGE_SIZE`. Blocking receives are cancelled by
//! delivering the interrupt signal to the worker thread.

use crate::backend::{Interrupt, QueueBackend, QueueReceiver, QueueSender, SendMode};
use crate::error::{Result, TransportError};
use crate::signals;
use nix::errno::Errno;
use nix::mqueue::{mq_attr_member_t, mq_close, mq_open, mq_receive, mq_send, mq_unlink};
use nix::mqueue::{MQ_OFlag, MqAttr, MqdT};
use nix::sys::pthread::{pthread_self, Pthread};
use nix::sys::stat::Mode;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::MAX_MESSAGE_SIZE;

const BACKEND: &str = "mqueue";

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageQueueBackend;

impl MessageQueueBackend {
    pub fn new() -> Self {
        Self
    }
}

fn queue_mode() -> Mode {
    Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IWGRP
}

impl QueueBackend for MessageQueueBackend {
    fn kind(&self) -> &'static str {
        BACKEND
    }

    fn listen(&self, name: &str, max_outstanding: usize) -> Result<Box<dyn QueueReceiver>> {
        let attr = MqAttr::new(
            0,
            max_outstanding as mq_attr_member_t,
            MAX_MESSAGE_SIZE as mq_attr_member_t,
            0,
        );
        let mqd = mq_open(
            name,
            MQ_OFlag::O_RDONLY | MQ_OFlag::O_CREAT,
            queue_mode(),
            Some(&attr),
        )
        .map_err(|e| TransportError::open_with_source(name, "mq_open for receive", e))?;
        info!("Message queue listening on: {}", name);
        Ok(Box::new(MqReceiver {
            name: name.to_string(),
            mqd: Some(mqd),
            thread: Arc::new(ThreadSlot::default()),
        }))
    }

    fn connect(&self, name: &str, mode: SendMode) -> Result<Box<dyn QueueSender>> {
        let mut flags = MQ_OFlag::O_WRONLY;
        if mode == SendMode::NonBlocking {
            flags |= MQ_OFlag::O_NONBLOCK;
        }
        let mqd = mq_open(name, flags, Mode::empty(), None)
            .map_err(|e| TransportError::open_with_source(name, "mq_open for send", e))?;
        debug!("Opened message queue {} for send ({:?})", name, mode);
        Ok(Box::new(MqSender {
            name: name.to_string(),
            mqd: Some(mqd),
        }))
    }

    fn unlink(&self, name: &str) -> Result<()> {
        match mq_unlink(name) {
            Ok(()) | Err(Errno::ENOENT) => Ok(()),
            Err(e) => Err(TransportError::open_with_source(name, "mq_unlink", e)),
        }
    }
}

/// Thread currently blocked in `receive`, if any
///
/// The slot is cleared under the lock before the worker exits, so a signal is
/// never sent to a thread id that could have been reused.
#[derive(Default)]
struct ThreadSlot {
    thread: Mutex<Option<Pthread>>,
}

impl Interrupt for ThreadSlot {
    fn interrupt(&self) -> Result<()> {
        match *self.thread.lock() {
            Some(thread) => signals::interrupt_thread(thread),
            None => Ok(()),
        }
    }
}

struct MqReceiver {
    name: String,
    mqd: Option<MqdT>,
    thread: Arc<ThreadSlot>,
}

impl QueueReceiver for MqReceiver {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mqd = self.mqd.as_ref().ok_or_else(|| TransportError::Closed {
            name: self.name.clone(),
        })?;
        let mut priority = 0u32;
        match mq_receive(mqd, buf, &mut priority) {
            Ok(len) => Ok(len),
            Err(Errno::EINTR) => Err(TransportError::Interrupted),
            Err(e) => Err(TransportError::receive_with_source(
                &self.name,
                "mq_receive",
                e,
            )),
        }
    }

    fn attach_current_thread(&mut self) -> Result<()> {
        signals::install_interrupt_handler()?;
        signals::unblock_interrupt_for_current_thread()?;
        *self.thread.thread.lock() = Some(pthread_self());
        Ok(())
    }

    fn detach_current_thread(&mut self) {
        *self.thread.thread.lock() = None;
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.thread.clone()
    }
}

impl Drop for MqReceiver {
    fn drop(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            if let Err(e) = mq_close(mqd) {
                warn!("mq_close on {} failed: {}", self.name, e);
            }
        }
    }
}

struct MqSender {
    name: String,
    mqd: Option<MqdT>,
}

impl QueueSender for MqSender {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: bytes.len(),
                limit: MAX_MESSAGE_SIZE,
            });
        }
        let mqd = self.mqd.as_ref().ok_or_else(|| TransportError::Closed {
            name: self.name.clone(),
        })?;
        loop {
            match mq_send(mqd, bytes, 0) {
                Ok(()) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(Errno::EAGAIN) => {
                    return Err(TransportError::QueueFull {
                        name: self.name.clone(),
                    })
                }
                Err(Errno::EBADF) => {
                    return Err(TransportError::Closed {
                        name: self.name.clone(),
                    })
                }
                Err(e) => return Err(TransportError::send_with_source(&self.name, "mq_send", e)),
            }
        }
    }
}

impl Drop for MqSender {
    fn drop(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            if let Err(e) = mq_close(mqd) {
                warn!("mq_close on {} failed: {}", self.name, e);
            }
        }
    }
}
