// ============================================
// File: crates/lanspeed-common/src/lib.rs
// ============================================
//! # LanSpeed Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types shared by the server, the client driver
//! and the protocol crate so that both ends agree on identifiers and
//! timestamp units.
//!
//! ## Main Functionality
//! - [`types`]: `SessionId`, `Direction`, `TestKind`
//! - [`time`]: Millisecond helpers for wire timestamps and intervals
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │     lanspeed-server            lanspeed-client      │
//! │            │                          │             │
//! │            ├──────────────────────────┤             │
//! │            ▼                          ▼             │
//! │      lanspeed-core          lanspeed-transport      │
//! │            │                                        │
//! │            ▼                                        │
//! │      lanspeed-common  ◄── You are here              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{Direction, SessionId, TestKind};
