//! # Clocklink Types
//!
//! Data model shared by every clocklink crate.
//!
//! ## Contents
//!
//! - **Protocol identifiers**: `MsgId`, `MsgAck`, `SessionId` and the wire limits
//! - **Clock status**: `ClockState`, `EventCounts`, raw `PtpSample`
//! - **Subscriptions**: `EventMask`, `Threshold`, `Subscription`
//! - **Time bases**: `TimeBaseCfg`
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → codec → transport
//!     ↑          ↓         ↓
//! Pure Data   Encoding   Queues
//! ```
//!
//! Nothing here performs I/O or encoding.

pub mod clock;
pub mod protocol;
pub mod subscription;
pub mod timebase;

pub use clock::{ClockIdentity, ClockState, EventCounts, PtpSample};
pub use protocol::{
    MsgAck, MsgId, SessionId, CLIENT_ID_LEN, INVALID_SESSION_ID, MAX_MESSAGE_SIZE,
    MAX_TIME_BASES, STRING_SIZE_MAX,
};
pub use subscription::{
    EventMask, Subscription, SubscriptionError, Threshold, OFFSET_THRESHOLD, THRESHOLD_MAX,
};
pub use timebase::{TimeBaseCfg, TimeBaseError};
