//! Client Error Types

use codec::CodecError;
use thiserror::Error;
use transport::TransportError;
use types::SessionId;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not connected to the proxy")]
    NotConnected,

    #[error("Already connected as session {session_id}")]
    AlreadyConnected { session_id: SessionId },

    /// No reply within the operation's deadline; the caller may retry
    #[error("{operation} timed out after {waited_ms}ms")]
    Timeout {
        operation: &'static str,
        waited_ms: u64,
    },

    /// The proxy answered with a Fail acknowledgement
    #[error("Proxy rejected {operation}")]
    Rejected { operation: &'static str },

    #[error("Time base {index} has no subscription")]
    NotSubscribed { index: i32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The listener worker could not be joined; fatal for the process
    #[error("Client shutdown failed: {source}")]
    Shutdown { source: TransportError },
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn timeout(operation: &'static str, waited: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            waited_ms: waited.as_millis() as u64,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Shutdown { .. })
    }
}
