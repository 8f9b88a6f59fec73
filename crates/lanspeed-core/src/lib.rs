// ============================================
// File: crates/lanspeed-core/src/lib.rs
// ============================================
//! # LanSpeed Core - Protocol & Measurement Library
//!
//! ## Creation Reason
//! Holds everything both ends of a throughput test must agree on: the
//! event messages, their JSON framing, how filler chunks are produced
//! and how bytes-over-time turn into a speed figure.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Tagged client/server message enums, one variant per event
//! - JSON text codec with tolerant decoding of damaged chunk frames
//!
//! ### Measure Module ([`measure`])
//! - `ChunkGenerator`: fixed-size filler with a single cursor
//! - `SpeedEstimator`: sliding-window smoothed speed
//! - `SpeedStats`: max/min/average summary of a finished session
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │     lanspeed-server            lanspeed-client      │
//! │            │                          │             │
//! │            ├──────────────────────────┤             │
//! │            ▼                          ▼             │
//! │      lanspeed-core          lanspeed-transport      │
//! │      You are here                                   │
//! │            │                                        │
//! │            ▼                                        │
//! │      lanspeed-common                                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Speeds are in binary megabytes per second (1 MB = 1,048,576 bytes)
//! - Nothing in this crate performs I/O or reads the clock
//! - Event names and camelCase payload fields are the wire contract
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod measure;
pub mod protocol;

// Re-export commonly used items
pub use error::{CoreError, Result};
pub use measure::{calculate_speed, ChunkGenerator, FillMethod, SpeedEstimator, SpeedStats, SpeedSummary};
pub use protocol::{ClientMessage, ServerMessage};
