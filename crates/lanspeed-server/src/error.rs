// ============================================
// File: crates/lanspeed-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Unifies configuration, session and lower-layer failures of the
//! server behind one enum.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session errors are scoped to one peer and reported to it as an
//!   `error` event; only fatal errors stop the process
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use lanspeed_common::{CommonError, SessionId};
use lanspeed_core::CoreError;
use lanspeed_transport::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    // ========================================
    // Configuration
    // ========================================

    /// Config file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Path of the file
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A config value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name, e.g. `speed_test.chunk_size`
        field: String,
        /// What's wrong with it
        reason: String,
    },

    // ========================================
    // Sessions
    // ========================================

    /// No session with this id is registered.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session with this id is already registered.
    #[error("Session {0} already exists")]
    SessionExists(SessionId),

    /// `limits.max_sessions` sessions are running.
    #[error("Session limit reached: max {limit} sessions")]
    SessionLimitReached {
        /// Configured cap
        limit: usize,
    },

    /// `test_start` named a direction the server does not run.
    #[error("Unsupported test direction: '{0}'")]
    UnsupportedDirection(String),

    // ========================================
    // Lifecycle
    // ========================================

    /// Listener could not be set up.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// Underlying failure
        reason: String,
    },

    /// Shutdown is in progress.
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Error from lanspeed-common.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from lanspeed-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from lanspeed-transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for config load and validation errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` for errors about a single session request.
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SessionExists(_)
                | Self::SessionLimitReached { .. }
                | Self::UnsupportedDirection(_)
        )
    }

    /// Returns `true` if the error should be reported to the peer as
    /// an `error` event.
    #[must_use]
    pub fn is_peer_visible(&self) -> bool {
        match self {
            Self::Core(e) => e.is_protocol_error(),
            Self::Common(e) => e.is_client_error(),
            other => other.is_session_error(),
        }
    }

    /// Returns `true` if the server cannot run at all.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::StartupFailed { .. }
        )
    }

    /// Process exit status for the binary (sysexits codes).
    ///
    /// | Error         | Status              |
    /// |---------------|---------------------|
    /// | config        | 78 `EX_CONFIG`      |
    /// | other fatal   | 69 `EX_UNAVAILABLE` |
    /// | anything else | 1                   |
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            78
        } else if self.is_fatal() {
            69
        } else {
            1
        }
    }
}
