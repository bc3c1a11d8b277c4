//! Codec errors
//!
//! Every variant carries enough context to log the dropped message without
//! re-reading the buffer.

use thiserror::Error;
use types::MsgId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A write would run past the end of the wire buffer
    #[error("Buffer overflow: need {need} bytes, {available} available (context: {context})")]
    BufferOverflow {
        need: usize,
        available: usize,
        context: String,
    },

    /// A read would run past the received bytes
    #[error("Message truncated: need {need} bytes, {available} available (context: {context})")]
    Truncated {
        need: usize,
        available: usize,
        context: String,
    },

    /// No body parser registered for this tag in the current role
    #[error("Unknown message type {msg_id:#04x}")]
    UnknownMessageType { msg_id: u8 },

    #[error("Message type {msg_id} is already registered")]
    DuplicateType { msg_id: MsgId },

    #[error("Invalid acknowledgement value {value:#04x}")]
    InvalidAck { value: u8 },

    /// Reserved or padding bytes carried data
    #[error("Reserved bytes not zero at offset {offset} (context: {context})")]
    ReservedNonZero { offset: usize, context: String },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{count} trailing bytes after {msg_id} body")]
    TrailingBytes { msg_id: MsgId, count: usize },
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl CodecError {
    pub fn buffer_overflow(need: usize, available: usize, context: impl Into<String>) -> Self {
        Self::BufferOverflow {
            need,
            available,
            context: context.into(),
        }
    }

    pub fn truncated(need: usize, available: usize, context: impl Into<String>) -> Self {
        Self::Truncated {
            need,
            available,
            context: context.into(),
        }
    }

    pub fn reserved_non_zero(offset: usize, context: impl Into<String>) -> Self {
        Self::ReservedNonZero {
            offset,
            context: context.into(),
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
