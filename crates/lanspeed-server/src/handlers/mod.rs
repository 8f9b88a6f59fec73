// ============================================
// File: crates/lanspeed-server/src/handlers/mod.rs
// ============================================
//! # Event Handlers
//!
//! ## Creation Reason
//! Turns inbound text frames into registry operations and reports
//! protocol errors back to the peer.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`events`]: Frame decoding, dispatch and error reporting
//!
//! ## Data Flow
//! ```text
//! frame → decode_client ─┬─ ok ──────► dispatch ─► registry / session
//!                        ├─ damaged chunk with ids ─► forward id only
//!                        └─ other error ─► `error` event to peer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run on the connection's reader task; never block here
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod events;

pub use events::EventHandler;
