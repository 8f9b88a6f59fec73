// ============================================
// File: crates/lanspeed-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Holds the measurement logic of the server, separated from sockets
//! and frame decoding.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`session`]: One measurement leg and its driver task
//! - [`registry`]: Session routing, composite sequencing, cancellation
//! - [`peer`]: Outbound message queue of one connection
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐   ┌─────────────────────────────────┐ │
//! │  │  SessionRegistry │   │     drive(TestSession)          │ │
//! │  │                  │──►│  - progress ticker              │ │
//! │  │  - route events  │   │  - watchdog deadline            │ │
//! │  │  - sequence legs │   │  - chunk / ack handling         │ │
//! │  └──────────────────┘   └──────────────┬──────────────────┘ │
//! │                                        │                    │
//! │                         ┌──────────────▼──────────────────┐ │
//! │                         │          PeerHandle             │ │
//! │                         │  ordered queue to the writer    │ │
//! │                         └─────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A session task is the only writer of its session state
//! - Everything here is testable without a socket
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod peer;
pub mod registry;
pub mod session;

// Re-export primary types
pub use peer::{PeerHandle, PeerId};
pub use registry::{PeerResults, SessionRegistry};
pub use session::{SessionCommand, SessionOutcome, SessionState, TestSession};
