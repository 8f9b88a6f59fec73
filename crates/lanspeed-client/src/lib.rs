// ============================================
// File: crates/lanspeed-client/src/lib.rs
// ============================================
//! # LanSpeed Client Library
//!
//! ## Creation Reason
//! Client half of the LAN throughput test. Drives upload and download
//! legs against a server and reports live and final figures to
//! whatever displays them.
//!
//! ## Main Functionality
//! - [`driver`]: Synchronous test state machine (`PeerDriver`)
//! - [`runner`]: Async loop over a `FrameTransport` (`TestRunner`)
//! - [`error`]: Client error types
//!
//! ## Usage
//! ```ignore
//! let transport = Arc::new(WsTransport::connect("ws://192.168.1.10:3000").await?);
//! let (tx, rx) = mpsc::unbounded_channel();
//! let mut runner = TestRunner::new(transport, DriverConfig::default())?.with_events(tx);
//! let report = runner.run(TestKind::Both, stop_rx).await?;
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The driver never touches the network or the clock; keep it that way
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod driver;
pub mod error;
pub mod runner;

// Re-export primary types
pub use driver::{DriverConfig, DriverEvent, PeerDriver, Phase, Step, TestReport};
pub use error::{ClientError, Result};
pub use runner::TestRunner;
