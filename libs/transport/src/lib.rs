//! # Clocklink Transport
//!
//! Named, bounded, message-oriented queues and the threads that drain them.
//!
//! ## Components
//!
//! - **Backends**: POSIX message queues (`MessageQueueBackend`) and an
//!   in-process equivalent (`LocalBackend`) behind the `QueueBackend` trait
//! - **Listener**: receiving endpoint, run on a dedicated worker thread
//! - **Transmitter**: sending endpoint
//! - **Worker**: thread with a stop flag, completion channel and bounded join
//! - **Signals**: interrupt handler, stop-signal masking and waiting
//!
//! ## Cancellation
//!
//! A blocked receive can run forever, so stopping a listener sets its stop
//! flag and then wakes the thread: the mqueue backend delivers `SIGUSR1` to
//! that thread, the local backend sends on a wake channel. Closing the queue
//! is never used as a wakeup.

pub mod backend;
pub mod error;
pub mod listener;
pub mod local;
pub mod mqueue;
pub mod signals;
pub mod transmitter;
pub mod worker;

pub use backend::{Interrupt, QueueBackend, QueueReceiver, QueueSender, SendMode, SharedBackend};
pub use error::{Result, TransportError};
pub use listener::{Listener, ListenerHandle};
pub use local::LocalBackend;
pub use mqueue::MessageQueueBackend;
pub use transmitter::Transmitter;
pub use worker::{StopFlag, Worker, INTERRUPT_RETRY, SHUTDOWN_TIMEOUT};
