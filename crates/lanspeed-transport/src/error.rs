// ============================================
// File: crates/lanspeed-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for establishing channels and moving text
//! frames over them.
//!
//! ## Error Categories
//! 1. **Connection Errors**: Bind, connect and handshake failures
//! 2. **Frame Errors**: Send and receive failures on a live channel
//! 3. **Lifecycle Errors**: Channel already closed
//!
//! ## ⚠️ Important Note for Next Developer
//! - A closed channel is normal at the end of a test; callers should
//!   check `is_closed()` before logging at warn level
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to bind the listening socket.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Failed to reach the server.
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Target URL
        url: String,
        /// Why the connection failed
        reason: String,
    },

    /// WebSocket upgrade failed.
    #[error("Handshake with {peer} failed: {reason}")]
    HandshakeFailed {
        /// Remote peer
        peer: String,
        /// Why the upgrade failed
        reason: String,
    },

    // ========================================
    // Frame Errors
    // ========================================

    /// Sending a frame failed.
    #[error("Failed to send frame: {reason}")]
    SendFailed {
        /// Why send failed
        reason: String,
    },

    /// Receiving a frame failed.
    #[error("Failed to receive frame: {reason}")]
    ReceiveFailed {
        /// Why receive failed
        reason: String,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// Channel is closed.
    #[error("Channel closed")]
    Closed,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Maps a WebSocket error raised while sending.
    pub fn from_send(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::SendFailed {
                reason: other.to_string(),
            },
        }
    }

    /// Maps a WebSocket error raised while receiving.
    pub fn from_recv(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::ReceiveFailed {
                reason: other.to_string(),
            },
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the channel is gone.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if retrying the connection may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
            ),
            _ => false,
        }
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
