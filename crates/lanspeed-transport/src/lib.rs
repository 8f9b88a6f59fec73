// ============================================
// File: crates/lanspeed-transport/src/lib.rs
// ============================================
//! # LanSpeed Transport - Event Channel Layer
//!
//! ## Creation Reason
//! Provides the persistent, bidirectional channel the throughput test
//! runs over, behind a trait so session code never sees sockets.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `FrameTransport` trait
//! - [`ws`]: WebSocket implementation (tokio-tungstenite)
//! - [`memory`]: In-memory pair for tests
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │     lanspeed-server            lanspeed-client      │
//! │            │                          │             │
//! │            └────────────┬─────────────┘             │
//! │              ┌──────────┴──────────┐                │
//! │              ▼                     ▼                │
//! │        lanspeed-core      lanspeed-transport        │
//! │                           You are here ◄──          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Frames are opaque text here; JSON lives in `lanspeed-core`
//! - Always use the trait for testability
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod traits;
pub mod ws;

// Re-export commonly used items
pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::FrameTransport;
pub use ws::WsTransport;
