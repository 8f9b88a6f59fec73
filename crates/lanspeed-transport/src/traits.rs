// ============================================
// File: crates/lanspeed-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Session logic only needs "send a text frame" and "wait for the next
//! text frame". Hiding the channel behind a trait lets the server and
//! the client driver run over WebSocket in production and over an
//! in-memory pair in tests.
//!
//! ## Design Philosophy
//! - Async-first design with `async_trait`
//! - Sending and receiving take `&self` so one task can read while
//!   another writes through a shared `Arc`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be `Send + Sync`
//! - `recv_text()` returns `Ok(None)` on an orderly close, not an error
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;

use crate::error::Result;

// ============================================
// FrameTransport Trait
// ============================================

/// Bidirectional channel of text frames.
///
/// # Example
/// ```ignore
/// async fn echo<T: FrameTransport>(transport: &T) -> Result<()> {
///     while let Some(frame) = transport.recv_text().await? {
///         transport.send_text(frame).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Sends one text frame.
    ///
    /// # Errors
    /// Returns `Closed` if the channel is gone, `SendFailed` otherwise.
    async fn send_text(&self, frame: String) -> Result<()>;

    /// Waits for the next text frame.
    ///
    /// # Returns
    /// `None` once the peer closed the channel.
    ///
    /// # Errors
    /// Returns `ReceiveFailed` on a broken channel.
    async fn recv_text(&self) -> Result<Option<String>>;

    /// Closes the channel. Further sends fail with `Closed`.
    ///
    /// # Errors
    /// Returns error if the close handshake fails.
    async fn close(&self) -> Result<()>;

    /// Label of the remote end, for logs.
    fn peer(&self) -> &str;
}
