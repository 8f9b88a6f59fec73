// ============================================
// File: crates/lanspeed-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Creation Reason
//! Unified error type for the client driver and runner.
//!
//! ## Error Categories
//! | Category   | Examples                    | Handling            |
//! |------------|-----------------------------|---------------------|
//! | State      | AlreadyRunning              | Caller bug          |
//! | Server     | Rejected                    | Report, exit        |
//! | Connection | ConnectionClosed, Transport | Retry may help      |
//! | User       | Cancelled                   | Exit quietly        |
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use lanspeed_common::CommonError;
use lanspeed_core::CoreError;
use lanspeed_transport::TransportError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `start` called while a test is in progress.
    #[error("A test is already running")]
    AlreadyRunning,

    /// The server answered with an `error` event.
    #[error("Server rejected the test: {0}")]
    Rejected(String),

    /// The server went away mid-test.
    #[error("Connection closed before the test finished")]
    ConnectionClosed,

    /// The local user stopped the test.
    #[error("Test cancelled")]
    Cancelled,

    /// Error from lanspeed-common.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from lanspeed-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from lanspeed-transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Returns `true` if the test cannot continue on this connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Transport(_) | Self::Rejected(_)
        )
    }

    /// Returns `true` if reconnecting and retrying may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Transport(e) => e.is_retryable() || e.is_closed(),
            _ => false,
        }
    }

    /// Process exit status for the binary.
    ///
    /// 130 when stopped by the user, 75 (`EX_TEMPFAIL`) when a retry may
    /// succeed, 1 for other fatal errors and 70 (`EX_SOFTWARE`) otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if matches!(self, Self::Cancelled) {
            130
        } else if self.is_retryable() {
            75
        } else if self.is_fatal() {
            1
        } else {
            70
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Rejected("Unsupported test direction: 'x'".into());
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_classification() {
        assert!(ClientError::ConnectionClosed.is_fatal());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(ClientError::from(TransportError::Closed).is_retryable());
        assert!(!ClientError::Cancelled.is_fatal());
        assert!(!ClientError::AlreadyRunning.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ClientError::Cancelled.exit_code(), 130);
        assert_eq!(ClientError::ConnectionClosed.exit_code(), 75);
        assert_eq!(
            ClientError::from(TransportError::connect_failed("ws://x", "refused")).exit_code(),
            75
        );
        assert_eq!(ClientError::Rejected("Session limit reached".into()).exit_code(), 1);
        assert_eq!(ClientError::AlreadyRunning.exit_code(), 70);
    }
}
