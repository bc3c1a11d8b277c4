//! # Clocklink Codec
//!
//! ## Purpose
//!
//! Wire framing for the clock status protocol:
//! - `WireBuffer`: fixed 4096-byte buffer with a cursor, reused for every pass
//! - `MessageHeader`: `{msg_id, msg_ack, session_id}` at the front of every message
//! - Message bodies: Connect, Subscribe, Notify, Disconnect and their replies
//! - `MessageCodec`: per-role registry from tag to body parser
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → transport
//!     ↑           ↓          ↓
//! Pure Data   Framing    Queue I/O
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Queue handling (belongs in transport)
//! - Session or subscription policy (belongs in the proxy and client)
//!
//! Reserved and padding bytes are always written as zero and rejected when
//! non-zero on decode.

pub mod buffers;
pub mod error;
pub mod header;
pub mod messages;
pub mod registry;

pub use buffers::{WireBuffer, WireEndian};
pub use error::{CodecError, CodecResult};
pub use header::MessageHeader;
pub use messages::{
    ConnectReply, ConnectRequest, Disconnect, Message, MessageBody, Notify, Payload,
    SubscribeReply, SubscribeRequest, WireFormat,
};
pub use registry::{BodyParser, MessageCodec, Role};
