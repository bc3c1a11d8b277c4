//! # Clocklink Client
//!
//! Client half of the clock status protocol.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──reply(Success)──► Connected
//!      ▲                          │ timeout / Fail               │
//!      └──────────────────────────┴──────── disconnect() ◄───────┘
//!                                           failed liveness probe
//! ```
//!
//! A [`ClockClient`] owns one listen queue (`<proxy queue>.<pid>`) drained by
//! a dedicated worker thread, and a transmitter to the proxy queue. The
//! worker decodes replies and notifications into shared state guarded by a
//! mutex; API calls wait on a condition variable with explicit deadlines.
//!
//! ```rust,no_run
//! use client::{ClientOptions, ClockClient, WaitStatus};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use transport::MessageQueueBackend;
//! use types::{EventMask, Subscription};
//!
//! let mut client = ClockClient::new(Arc::new(MessageQueueBackend::new()), ClientOptions::default());
//! client.connect()?;
//! let mut sub = Subscription::new(EventMask::OFFSET_IN_RANGE);
//! sub.define_threshold(0, 8888, -8888)?;
//! client.subscribe(1, sub)?;
//! if let WaitStatus::Updated { state, counts } = client.status_wait(1, Duration::from_secs(1))? {
//!     println!("{state} ({} offset transitions)", counts.offset_in_range);
//! }
//! client.disconnect()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;
pub mod error;
mod options;
mod state;

pub use client::{ClockClient, WaitStatus};
pub use error::{ClientError, Result};
pub use options::ClientOptions;
