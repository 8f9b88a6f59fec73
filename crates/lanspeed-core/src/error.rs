// ============================================
// File: crates/lanspeed-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for frame decoding and measurement setup.
//!
//! ## Error Categories
//! 1. **Protocol Errors**: Unparseable frame, unknown event, bad payload
//! 2. **Setup Errors**: Invalid chunk or window sizes
//!
//! ## ⚠️ Important Note for Next Developer
//! - `MalformedMessage` carries whatever ids could still be recovered
//!   from the damaged payload; the client driver relies on `chunk_id`
//!   to keep download flow control alive
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use lanspeed_common::error::CommonError;
use lanspeed_common::SessionId;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and measurement operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Protocol Errors
    // ========================================

    /// Frame is not a JSON event envelope.
    #[error("Invalid frame: {reason}")]
    InvalidFrame {
        /// Why the frame was rejected
        reason: String,
    },

    /// Event name not part of the protocol.
    #[error("Unknown event: '{0}'")]
    UnknownEvent(String),

    /// Known event whose payload failed validation.
    #[error("Malformed '{event}' message: {reason}")]
    MalformedMessage {
        /// Event name from the envelope
        event: String,
        /// What's wrong with the payload
        reason: String,
        /// Session id, if it could be recovered
        session_id: Option<SessionId>,
        /// Chunk id, if it could be recovered
        chunk_id: Option<u64>,
    },

    /// Failed to serialize an outbound message.
    #[error("Failed to encode '{event}': {reason}")]
    Encode {
        /// Event being encoded
        event: String,
        /// Serializer error
        reason: String,
    },

    // ========================================
    // Setup Errors
    // ========================================

    /// Measurement parameter out of range.
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter {
        /// Parameter name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates an `InvalidFrame` error.
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedMessage` error with no recovered ids.
    pub fn malformed(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            event: event.into(),
            reason: reason.into(),
            session_id: None,
            chunk_id: None,
        }
    }

    /// Creates an `InvalidParameter` error.
    pub fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a protocol error.
    ///
    /// Protocol errors are reported back to the peer as an `error` event.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame { .. } | Self::UnknownEvent(_) | Self::MalformedMessage { .. }
        )
    }

    /// Event name of a malformed message.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        match self {
            Self::MalformedMessage { event, .. } | Self::Encode { event, .. } => Some(event),
            Self::UnknownEvent(event) => Some(event),
            _ => None,
        }
    }

    /// Chunk id recovered from a malformed chunk message.
    #[must_use]
    pub const fn recovered_chunk_id(&self) -> Option<u64> {
        match self {
            Self::MalformedMessage { chunk_id, .. } => *chunk_id,
            _ => None,
        }
    }
}

// ============================================
// Tests
// ============================================
