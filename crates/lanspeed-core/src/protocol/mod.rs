// ============================================
// File: crates/lanspeed-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the event protocol spoken over the persistent channel
//! between a test client and the server.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Typed event variants and payloads
//! - [`codec`]: JSON text framing and validation
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Upload Leg                             │
//! │  Client ──── test_start {upload} ───────────────────► Server│
//! │  Client ◄─── upload_start {sessionId} ────────────── Server │
//! │  Client ──── upload_data #1 ────────────────────────► Server│
//! │  Client ◄─── upload_ack #1 ───────────────────────── Server │
//! │              ... until the test duration elapses            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Download Leg                           │
//! │  Client ◄─── download_start / download_data #1 ───── Server │
//! │  Client ──── download_ack #1 ───────────────────────► Server│
//! │  Client ◄─── download_data #2 ────────────────────── Server │
//! │              ... one chunk in flight at a time              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  test_progress every tick, test_result once per session     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Acks are matched by `chunkId`, never by arrival order
//! - Any change to event names or payload fields breaks old peers
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

// Re-export primary types
pub use codec::{decode_client, decode_server, encode_client, encode_server};
pub use messages::{
    ChunkAck, ClientMessage, DataChunk, ErrorMessage, Progress, ServerMessage, SessionStarted,
    TestResult, TestStart, TestStop,
};
pub use crate::measure::SpeedSummary;
