// ============================================
// File: crates/lanspeed-server/src/services/peer.rs
// ============================================
//! # Peer Handle
//!
//! Outbound side of one connected peer. Sessions and the event handler
//! push `ServerMessage`s into an unbounded queue; the connection's
//! writer task encodes and sends them in order. Once the writer is gone
//! every send is a silent no-op.
//!
//! ## Last Modified
//! v0.1.0 - Initial peer handle

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use lanspeed_core::ServerMessage;

// ============================================
// PeerId
// ============================================

/// Identifier of one connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

// ============================================
// PeerHandle
// ============================================

/// Cloneable sender towards one peer.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl PeerHandle {
    /// Creates a handle and the queue its writer drains.
    #[must_use]
    pub fn channel(id: PeerId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// Peer id.
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Queues one message. Returns `false` if the peer is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        let event = msg.event();
        let queued = self.tx.send(msg).is_ok();
        if !queued {
            trace!(peer = %self.id, event, "Peer gone, message dropped");
        }
        queued
    }

    /// Queues messages in order, stopping at the first failure.
    pub fn send_all(&self, msgs: impl IntoIterator<Item = ServerMessage>) -> bool {
        msgs.into_iter().all(|msg| self.send(msg))
    }

    /// Returns `true` once the writer side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
