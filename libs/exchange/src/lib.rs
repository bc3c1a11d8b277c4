//! # Clocklink State Exchange
//!
//! ## Purpose
//!
//! Lets one producer thread publish snapshots arbitrarily often while a
//! consumer thread reads them without ever seeing a torn value, and without
//! the producer ever waiting on the consumer's processing.
//!
//! ## Protocol
//!
//! Three locks plus an `update_available` flag:
//!
//! ```text
//!            data                 producer               consumer
//! Producer   held while writing   held for its lifetime  try-locked on commit
//! Consumer   held while copying   taken to rendezvous    held for its lifetime
//! ```
//!
//! - **produce**: lock *data*, copy the shared value into the write shadow.
//!   The caller edits the shadow.
//! - **commit**: publish the shadow if it differs, set `update_available`,
//!   release *data*. Then try *consumer*. Success means a consumer let go of
//!   it to wait on *producer*, so the producer fairly hands *producer* over
//!   and takes it back once the consumer holds *data*.
//! - **consume(timeout)**: lock *data* before the deadline. With an update
//!   pending, copy into the read shadow, clear the flag and release. With no
//!   update, release *consumer* and *data*, wait on *producer* (same
//!   deadline), retake *consumer*, then *data*, then release *producer*. The
//!   consumer thus wakes right after the next commit or at its deadline. A
//!   commit landing before the consumer parks is picked up by a last try on
//!   *data* at the deadline.
//!
//! A consume that times out returns `None`; that is "no update yet", not an
//! error. Each exchange has at most one `Producer` and one `Consumer` alive at
//! a time. Any number of threads may call [`StateExchange::snapshot`].

mod exchange;

pub use exchange::{Consumer, ProduceGuard, Producer, StateExchange};
