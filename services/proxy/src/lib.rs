//! # Clocklink Proxy
//!
//! Publishes time-synchronization status to clocklink clients over named
//! message queues.
//!
//! ## Threads
//!
//! ```text
//!  ClockSource ──► monitor ──(ClockStatus)──► notifier ──► client queues
//!                    ▲                           │
//!                    └──(ClockConfiguration)─────┤
//!                                                │
//!  proxy queue ──► listener/dispatch ──► Registry (sessions, interest)
//! ```
//!
//! - **listener**: one thread drains the proxy queue, so Connect, Subscribe
//!   and Disconnect are handled one at a time
//! - **monitor**: pulls samples from the [`ClockSource`] and commits them to
//!   the ClockStatus exchange
//! - **notifier**: consumes ClockStatus, evaluates every subscription and
//!   sends Notify messages
//!
//! The registry mutex is shared by dispatch and the notifier only. The
//! monitor talks to both of them through state exchanges.

pub mod dispatch;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod session;
pub mod source;
pub mod status;
pub mod tracker;
pub mod workers;

pub use dispatch::Dispatcher;
pub use error::{ProxyError, Result};
pub use proxy::Proxy;
pub use registry::Registry;
pub use session::{Session, SessionTable};
pub use source::{ChannelClockSource, ClockSource, SimulatedClockSource};
pub use status::{
    clock_configuration, clock_status, ClockConfiguration, ClockStatus, Interest, InterestTable,
    StatusTable,
};
pub use tracker::EventTracker;
