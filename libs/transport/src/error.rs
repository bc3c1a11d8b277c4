//! Transport Error Types
//!
//! Queue, worker and signal failures. Transport errors are reported to the
//! caller and never retried here; callers own the retry policy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Queue could not be created or opened
    #[error("Failed to open queue {name}: {message}")]
    Open {
        name: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Send to {name} failed: {message}")]
    Send {
        name: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Receive on {name} failed: {message}")]
    Receive {
        name: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Non-blocking send found the peer's queue full
    #[error("Queue {name} is full")]
    QueueFull { name: String },

    #[error("Message of {size} bytes exceeds the {limit} byte queue limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// A blocking call returned early because of the interrupt signal
    #[error("Blocking call interrupted")]
    Interrupted,

    /// The peer queue no longer exists
    #[error("Queue {name} is closed")]
    Closed { name: String },

    /// A worker did not exit within the shutdown bound
    #[error("Worker {worker} did not exit within {timeout_ms}ms")]
    ShutdownTimeout { worker: String, timeout_ms: u64 },

    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: String, message: String },

    #[error("Signal setup failed: {message}")]
    Signal {
        message: String,
        source: Option<nix::Error>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    pub fn open(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Open {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn open_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Open {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn send_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Send {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn receive_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Receive {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn signal(message: impl Into<String>, source: nix::Error) -> Self {
        Self::Signal {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn worker_failed(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker: worker.into(),
            message: message.into(),
        }
    }

    /// Shutdown errors must reach the process supervisor
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::ShutdownTimeout { .. })
    }

    /// Whether a retry by the caller could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::QueueFull { .. } | TransportError::Interrupted
        )
    }

    /// Error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Open { .. } => "open",
            TransportError::Send { .. } => "send",
            TransportError::Receive { .. } => "receive",
            TransportError::QueueFull { .. } => "queue_full",
            TransportError::MessageTooLarge { .. } => "message_too_large",
            TransportError::Interrupted => "interrupted",
            TransportError::Closed { .. } => "closed",
            TransportError::ShutdownTimeout { .. } => "shutdown_timeout",
            TransportError::WorkerFailed { .. } => "worker_failed",
            TransportError::Signal { .. } => "signal",
            TransportError::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_shutdown_timeout_is_fatal() {
        let timeout = TransportError::ShutdownTimeout {
            worker: "listener".into(),
            timeout_ms: 200,
        };
        assert!(timeout.is_fatal());
        assert_eq!(timeout.to_string(), "Worker listener did not exit within 200ms");
        assert!(!TransportError::Interrupted.is_fatal());
        assert!(TransportError::Interrupted.is_transient());
    }
}
