//! Error types for the chat client core
//!
//! `ConnectFailed`/`ConnectTimeout` are transient and retried by the reconnect loop.
//! `ReadFailed` ends the current connection. `WriteFailed` is logged and swallowed by
//! the session. `Closed` is returned for any use of a connection after `close()`.

use std::io;

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors produced by the chat client core
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Connection to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Connection to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },

    #[error("Read failed: {0}")]
    ReadFailed(#[source] io::Error),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("Connection is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChatError {
    /// Whether the reconnect loop should treat this error as a failed attempt and retry
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            ChatError::ConnectFailed { .. } | ChatError::ConnectTimeout { .. }
        )
    }
}

/// Result type for chat client operations
pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_classification() {
        let refused = ChatError::ConnectFailed {
            addr: "localhost:8688".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let timeout = ChatError::ConnectTimeout {
            addr: "localhost:8688".to_string(),
            timeout_ms: 500,
        };

        assert!(refused.is_connect_failure());
        assert!(timeout.is_connect_failure());
        assert!(!ChatError::Closed.is_connect_failure());
        assert!(!ChatError::ReadFailed(io::Error::from(io::ErrorKind::BrokenPipe)).is_connect_failure());
    }

    #[test]
    fn test_error_display() {
        let err = ChatError::ConnectTimeout {
            addr: "example.org:7".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Connection to example.org:7 timed out after 250ms");
        assert_eq!(ChatError::Closed.to_string(), "Connection is closed");
    }
}
