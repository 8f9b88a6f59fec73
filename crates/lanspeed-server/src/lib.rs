// ============================================
// File: crates/lanspeed-server/src/lib.rs
// ============================================
//! # LanSpeed Server Library
//!
//! ## Creation Reason
//! Provides the server half of the LAN throughput test: it accepts
//! peers, runs measurement sessions and publishes live and final
//! speed figures.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`server`]: Listener, connection tasks and lifecycle
//! - [`services`]: Measurement logic
//!   - [`services::session`]: One leg's state machine and driver task
//!   - [`services::registry`]: Routing, composite sequencing, cancellation
//!   - [`services::peer`]: Outbound queue of a connection
//! - [`handlers`]: Inbound event handling
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        LanSpeed Server                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Server    │────►│  EventHandler   │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     ▼             │
//! │                             │            ┌─────────────────┐    │
//! │                             │            │ SessionRegistry │    │
//! │                             │            └────────┬────────┘    │
//! │                             │                     ▼             │
//! │                             │            ┌─────────────────┐    │
//! │                             │            │  Session tasks  │    │
//! │                             │            └─────────────────┘    │
//! ├─────────────────────────────┴───────────────────────────────────┤
//! │                     Transport Layer                             │
//! │          WebSocket text frames (lanspeed-transport)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - Speeds are computed server-side; client figures are display only
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
