//! Proxy Error Types
//!
//! Protocol errors drop the offending message; they never stop the proxy.

use codec::CodecError;
use thiserror::Error;
use transport::TransportError;
use types::{MsgId, SessionId};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unknown session {session_id}")]
    UnknownSession { session_id: SessionId },

    /// The session id was reused by another client since the sender last saw it
    #[error("Session {session_id} belongs to {expected}, not {received}")]
    ClientMismatch {
        session_id: SessionId,
        expected: String,
        received: String,
    },

    #[error("All {capacity} session slots are in use")]
    SessionsExhausted { capacity: usize },

    #[error("Unknown time base {index}")]
    UnknownTimeBase { index: i32 },

    #[error("Session {session_id} already holds a different subscription on time base {index}")]
    SubscriptionConflict { session_id: SessionId, index: i32 },

    #[error("Unexpected {msg_id} message on the proxy queue")]
    UnexpectedMessage { msg_id: MsgId },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Protocol errors are logged and the message dropped.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownSession { .. } | Self::ClientMismatch { .. } => "session",
            Self::SessionsExhausted { .. } => "capacity",
            Self::UnknownTimeBase { .. } | Self::SubscriptionConflict { .. } => "subscription",
            Self::UnexpectedMessage { .. } | Self::Codec(_) => "protocol",
            Self::Transport(_) => "transport",
        }
    }
}
