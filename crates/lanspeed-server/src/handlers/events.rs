// ============================================
// File: crates/lanspeed-server/src/handlers/events.rs
// ============================================
//! # Event Handler
//!
//! ## Creation Reason
//! Single entry point for everything a peer sends. Validates frames at
//! the boundary, so sessions only ever see typed commands.
//!
//! ## Main Functionality
//! - `handle_frame()`: decode and dispatch one frame
//! - `handle_disconnect()`: cancel what the departed peer owned
//!
//! ## Error Policy
//! | Failure                               | Reaction                    |
//! |---------------------------------------|-----------------------------|
//! | Not JSON / unknown event              | `error` event               |
//! | `test_start` with unknown direction   | `error` event, no session   |
//! | Chunk frame missing fields, ids known | forwarded with 0 bytes      |
//! | Event for unknown/ended session       | dropped, debug log          |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Stray acks after a timeout are expected, keep them at debug level
//!
//! ## Last Modified
//! v0.1.0 - Initial event handler

use std::sync::Arc;

use tracing::{debug, info, warn};

use lanspeed_common::SessionId;
use lanspeed_core::protocol::decode_client;
use lanspeed_core::{ClientMessage, CoreError, ServerMessage};

use crate::error::{Result, ServerError};
use crate::services::peer::{PeerHandle, PeerId};
use crate::services::registry::SessionRegistry;
use crate::services::session::SessionCommand;

// ============================================
// EventHandler
// ============================================

/// Dispatches inbound peer events.
pub struct EventHandler {
    registry: Arc<SessionRegistry>,
}

impl EventHandler {
    /// Creates a handler over `registry`.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this handler drives.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one text frame from `peer`.
    pub fn handle_frame(&self, peer: &PeerHandle, frame: &str) {
        let outcome = match decode_client(frame) {
            Ok(msg) => self.dispatch(peer, msg),
            Err(err) => self.salvage(peer.id(), err),
        };

        if let Err(err) = outcome {
            self.report(peer, &err);
        }
    }

    /// Cancels every session of a departed peer.
    ///
    /// Returns the number of sessions cancelled.
    pub fn handle_disconnect(&self, peer: PeerId) -> usize {
        self.registry.cancel_peer(peer)
    }

    // ========================================
    // Dispatch
    // ========================================

    fn dispatch(&self, peer: &PeerHandle, msg: ClientMessage) -> Result<()> {
        match msg {
            ClientMessage::TestStart(start) => {
                let kind = start
                    .kind()
                    .map_err(|_| ServerError::UnsupportedDirection(start.direction.clone()))?;
                let request = self.registry.start(peer, kind)?;
                info!(peer = %peer.id(), request = %request, kind = %kind, "Test requested");
            }
            ClientMessage::TestStop(stop) => {
                if self.registry.cancel(peer.id(), &stop.session_id) {
                    info!(peer = %peer.id(), session_id = %stop.session_id, "Test stopped by peer");
                } else {
                    debug!(
                        peer = %peer.id(),
                        session_id = %stop.session_id,
                        "Stop for unknown session ignored"
                    );
                }
            }
            ClientMessage::UploadData(chunk) => {
                let command = SessionCommand::UploadData {
                    chunk_id: chunk.chunk_id,
                    bytes: chunk.data.len() as u64,
                };
                self.route(peer.id(), &chunk.session_id, command, "upload_data");
            }
            ClientMessage::DownloadAck(ack) => {
                let command = SessionCommand::DownloadAck {
                    chunk_id: ack.chunk_id,
                };
                self.route(peer.id(), &ack.session_id, command, "download_ack");
            }
        }
        Ok(())
    }

    /// Keeps flow control alive when a chunk frame is damaged but still
    /// names its session and chunk.
    fn salvage(&self, peer: PeerId, err: CoreError) -> Result<()> {
        if let CoreError::MalformedMessage {
            event,
            reason,
            session_id: Some(session_id),
            chunk_id: Some(chunk_id),
        } = &err
        {
            let command = match event.as_str() {
                "upload_data" => Some(SessionCommand::UploadData {
                    chunk_id: *chunk_id,
                    bytes: 0,
                }),
                "download_ack" => Some(SessionCommand::DownloadAck {
                    chunk_id: *chunk_id,
                }),
                _ => None,
            };

            if let Some(command) = command {
                debug!(
                    peer = %peer,
                    session_id = %session_id,
                    chunk_id,
                    reason = %reason,
                    "Damaged chunk frame, forwarding its id"
                );
                self.route(peer, session_id, command, event);
                return Ok(());
            }
        }
        Err(err.into())
    }

    fn route(&self, peer: PeerId, id: &SessionId, command: SessionCommand, event: &str) {
        if !self.registry.forward(peer, id, command) {
            debug!(peer = %peer, session_id = %id, event, "Stray event ignored");
        }
    }

    fn report(&self, peer: &PeerHandle, err: &ServerError) {
        if err.is_peer_visible() {
            debug!(peer = %peer.id(), error = %err, "Rejecting peer request");
            peer.send(ServerMessage::error(err.to_string()));
        } else {
            warn!(peer = %peer.id(), error = %err, "Failed to handle peer event");
        }
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("registry", &self.registry)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::config::SpeedTestConfig;

    fn handler() -> EventHandler {
        let config = SpeedTestConfig {
            chunk_size: 4,
            upload_duration_ms: 1_000,
            download_duration_ms: 1_000,
            ..SpeedTestConfig::default()
        };
        EventHandler::new(Arc::new(SessionRegistry::new(config, 16)))
    }

    fn peer() -> (PeerHandle, UnboundedReceiver<ServerMessage>) {
        PeerHandle::channel(PeerId::next())
    }

    async fn next_non_progress(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
        loop {
            let msg = rx.recv().await.unwrap();
            if msg.event() != "test_progress" {
                return msg;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_direction_yields_error() {
        let h = handler();
        let (p, mut rx) = peer();
        h.handle_frame(&p, r#"{"event":"test_start","payload":{"direction":"sideways"}}"#);

        match rx.try_recv().unwrap() {
            ServerMessage::Error(e) => assert!(e.message.contains("sideways")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_yields_error() {
        let h = handler();
        let (p, mut rx) = peer();
        h.handle_frame(&p, "not json");
        h.handle_frame(&p, r#"{"event":"ping","payload":{}}"#);
        h.handle_frame(&p, r#"{"event":"test_start","payload":{}}"#);
        for _ in 0..3 {
            assert_eq!(rx.try_recv().unwrap().event(), "error");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stray_ack_is_ignored() {
        let h = handler();
        let (p, mut rx) = peer();
        h.handle_frame(
            &p,
            r#"{"event":"download_ack","payload":{"sessionId":"gone","chunkId":3,"receivedAt":1}}"#,
        );
        h.handle_frame(
            &p,
            r#"{"event":"upload_data","payload":{"sessionId":"gone","chunkId":3,"data":"AAAA"}}"#,
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_flow() {
        let h = handler();
        let (p, mut rx) = peer();
        h.handle_frame(&p, r#"{"event":"test_start","payload":{"direction":"upload"}}"#);

        let id = match next_non_progress(&mut rx).await {
            ServerMessage::UploadStart(s) => s.session_id,
            other => panic!("unexpected {other:?}"),
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.handle_frame(
            &p,
            &format!(r#"{{"event":"upload_data","payload":{{"sessionId":"{id}","chunkId":1,"data":"AAAAAA=="}}}}"#),
        );
        match next_non_progress(&mut rx).await {
            ServerMessage::UploadAck(ack) => assert_eq!(ack.chunk_id, 1),
            other => panic!("unexpected {other:?}"),
        }

        // damaged chunk still gets its ack
        h.handle_frame(
            &p,
            &format!(r#"{{"event":"upload_data","payload":{{"sessionId":"{id}","chunkId":2}}}}"#),
        );
        match next_non_progress(&mut rx).await {
            ServerMessage::UploadAck(ack) => assert_eq!(ack.chunk_id, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_without_result() {
        let h = handler();
        let (p, mut rx) = peer();
        h.handle_frame(&p, r#"{"event":"test_start","payload":{"direction":"download"}}"#);

        let id = match next_non_progress(&mut rx).await {
            ServerMessage::DownloadStart(s) => s.session_id,
            other => panic!("unexpected {other:?}"),
        };
        h.handle_frame(
            &p,
            &format!(r#"{{"event":"test_stop","payload":{{"sessionId":"{id}"}}}}"#),
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(h.registry().is_empty());
        while let Ok(msg) = rx.try_recv() {
            assert_ne!(msg.event(), "test_result");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_all() {
        let h = handler();
        let (p, _rx) = peer();
        h.handle_frame(&p, r#"{"event":"test_start","payload":{"direction":"upload"}}"#);
        h.handle_frame(&p, r#"{"event":"test_start","payload":{"direction":"download"}}"#);
        assert_eq!(h.registry().len(), 2);

        assert_eq!(h.handle_disconnect(p.id()), 2);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(h.registry().is_empty());
    }
}
