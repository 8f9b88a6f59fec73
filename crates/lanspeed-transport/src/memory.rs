// ============================================
// File: crates/lanspeed-transport/src/memory.rs
// ============================================
//! # In-Memory Transport
//!
//! ## Creation Reason
//! Provides a connected pair of transports for testing without
//! sockets, so the whole protocol can run under tokio's paused clock.
//!
//! ## Main Functionality
//! - `MemoryTransport::pair()`: two cross-wired endpoints
//! - Frame counters for flow-control assertions
//!
//! ## Usage in Tests
//! ```
//! use lanspeed_transport::{FrameTransport, MemoryTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (a, b) = MemoryTransport::pair("client", "server");
//! a.send_text("hello".into()).await.unwrap();
//! assert_eq!(b.recv_text().await.unwrap().as_deref(), Some("hello"));
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Queues are unbounded; tests must drain what they provoke
//! - Dropping or closing one end ends the other end's stream
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory transport

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::FrameTransport;

// ============================================
// MemoryTransport
// ============================================

/// One end of an in-memory frame channel.
pub struct MemoryTransport {
    label: String,
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    sent: AtomicU64,
    received: AtomicU64,
}

impl MemoryTransport {
    /// Creates two connected endpoints.
    ///
    /// Frames sent on one are received on the other, in order.
    #[must_use]
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a.into(), a_tx, a_rx), Self::new(b.into(), b_tx, b_rx))
    }

    fn new(
        label: String,
        tx: mpsc::UnboundedSender<String>,
        rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            label,
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
        }
    }

    /// Frames sent from this end.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames received on this end.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Returns a received frame without waiting, if one is queued.
    pub fn try_recv_text(&self) -> Option<String> {
        let frame = self.rx.try_lock().ok()?.try_recv().ok()?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    async fn send_text(&self, frame: String) -> Result<()> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn recv_text(&self) -> Result<Option<String>> {
        let frame = self.rx.lock().await.recv().await;
        if frame.is_some() {
            self.received.fetch_add(1, Ordering::Relaxed);
        }
        Ok(frame)
    }

    async fn close(&self) -> Result<()> {
        self.tx.lock().take();
        Ok(())
    }

    fn peer(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("label", &self.label)
            .field("sent", &self.frames_sent())
            .field("received", &self.frames_received())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_cross_wired() {
        let (a, b) = MemoryTransport::pair("a", "b");
        a.send_text("ping".into()).await.unwrap();
        b.send_text("pong".into()).await.unwrap();

        assert_eq!(b.recv_text().await.unwrap().as_deref(), Some("ping"));
        assert_eq!(a.recv_text().await.unwrap().as_deref(), Some("pong"));
        assert_eq!(a.frames_sent(), 1);
        assert_eq!(a.frames_received(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = MemoryTransport::pair("a", "b");
        a.send_text("last".into()).await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.recv_text().await.unwrap().as_deref(), Some("last"));
        assert_eq!(b.recv_text().await.unwrap(), None);
        assert!(a.send_text("late".into()).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (a, b) = MemoryTransport::pair("a", "b");
        drop(b);
        assert!(a.send_text("x".into()).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_try_recv() {
        let (a, b) = MemoryTransport::pair("a", "b");
        assert!(b.try_recv_text().is_none());
        a.send_text("x".into()).await.unwrap();
        assert_eq!(b.try_recv_text().as_deref(), Some("x"));
        assert_eq!(a.peer(), "a");
    }
}
