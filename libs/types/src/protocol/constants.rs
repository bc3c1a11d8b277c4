//! Protocol constants and basic types
//!
//! These are fundamental data types shared by the codec, the proxy and the
//! client. Encoding logic lives in the codec crate.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier assigned by the proxy on connect
pub type SessionId = u16;

/// Sentinel carried in the header until a connect handshake assigns an id
pub const INVALID_SESSION_ID: SessionId = SessionId::MAX;

/// Capacity of every queue message and of the wire buffer
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Fixed width of the client identity (reply queue name) on the wire
pub const CLIENT_ID_LEN: usize = 256;

/// Fixed width of the string fields of a time base entry
pub const STRING_SIZE_MAX: usize = 64;

/// Number of time base entries a connect reply can carry
pub const MAX_TIME_BASES: usize = 16;

/// Message type tag, first byte of every header
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive,
)]
pub enum MsgId {
    Connect = 2,
    Subscribe = 3,
    Notify = 4,
    Disconnect = 5,
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MsgId::Connect => "CONNECT",
            MsgId::Subscribe => "SUBSCRIBE",
            MsgId::Notify => "NOTIFY",
            MsgId::Disconnect => "DISCONNECT",
        };
        f.write_str(name)
    }
}

/// Acknowledgement disposition, second byte of every header
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
)]
pub enum MsgAck {
    #[default]
    None = 0,
    Success = 1,
    Fail = 0xFF,
}

impl MsgAck {
    pub fn is_success(self) -> bool {
        self == MsgAck::Success
    }
}
