//! Protocol layer types
//!
//! Identifiers and limits every message on the wire agrees on.

pub mod constants;

pub use constants::{
    MsgAck, MsgId, SessionId, CLIENT_ID_LEN, INVALID_SESSION_ID, MAX_MESSAGE_SIZE,
    MAX_TIME_BASES, STRING_SIZE_MAX,
};
