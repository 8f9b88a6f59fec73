// ============================================
// File: crates/lanspeed-client/src/runner.rs
// ============================================
//! # Test Runner
//!
//! ## Creation Reason
//! Async shell around [`PeerDriver`]: reads frames from a
//! [`FrameTransport`], feeds the driver, sends what it returns and
//! forwards display events to a channel.
//!
//! ## Main Loop
//! ```text
//!            ┌────────────────────────────────────┐
//!            │ select!                            │
//!  frame ───►│  decode ─┬─ ok ──► driver.handle   │──► send outgoing
//!            │          └─ err ─► handle_malformed│──► emit events
//!  timer ───►│  driver.poll (composite fallback)  │
//!  stop  ───►│  driver.cancel → test_stop         │
//!            └────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial runner

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, warn};

use lanspeed_common::TestKind;
use lanspeed_core::protocol::{decode_server, encode_client};
use lanspeed_core::ClientMessage;
use lanspeed_transport::FrameTransport;

use crate::driver::{DriverConfig, DriverEvent, PeerDriver, Step, TestReport};
use crate::error::{ClientError, Result};

/// Runs tests over one connection.
pub struct TestRunner<T: ?Sized> {
    transport: Arc<T>,
    driver: PeerDriver,
    events: Option<mpsc::UnboundedSender<DriverEvent>>,
}

impl<T> TestRunner<T>
where
    T: FrameTransport + ?Sized,
{
    /// Creates a runner over `transport`.
    ///
    /// # Errors
    /// Returns error if the driver configuration is invalid.
    pub fn new(transport: Arc<T>, config: DriverConfig) -> Result<Self> {
        Ok(Self {
            transport,
            driver: PeerDriver::new(config)?,
            events: None,
        })
    }

    /// Forwards display events to `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<DriverEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// The underlying driver.
    #[must_use]
    pub const fn driver(&self) -> &PeerDriver {
        &self.driver
    }

    /// Runs one test to completion.
    ///
    /// # Errors
    /// - `Rejected` if the server refuses the test
    /// - `ConnectionClosed` if the peer goes away first
    /// - `Cancelled` if `stop` fires; a `test_stop` is sent for the
    ///   running leg
    pub async fn run(
        &mut self,
        kind: TestKind,
        mut stop: broadcast::Receiver<()>,
    ) -> Result<TestReport> {
        let request = self.driver.start(kind, Instant::now())?;
        self.send(request).await?;

        while !self.driver.is_finished() {
            let deadline = self.driver.next_deadline();

            let step = tokio::select! {
                _ = stop.recv() => {
                    if let Some(msg) = self.driver.cancel() {
                        if let Err(e) = self.send(msg).await {
                            debug!(error = %e, "Could not send test_stop");
                        }
                    }
                    return Err(ClientError::Cancelled);
                }
                frame = self.transport.recv_text() => match frame? {
                    Some(text) => self.on_frame(&text),
                    None => return Err(ClientError::ConnectionClosed),
                },
                () = wait_until(deadline) => self.driver.poll(Instant::now()),
            };

            self.apply(step).await?;
        }

        match self.driver.failure() {
            Some(message) => Err(ClientError::Rejected(message.to_string())),
            None => Ok(self.driver.report().clone()),
        }
    }

    fn on_frame(&mut self, text: &str) -> Step {
        let now = Instant::now();
        match decode_server(text) {
            Ok(msg) => self.driver.handle(msg, now),
            Err(e) => {
                if !e.is_protocol_error() {
                    warn!(error = %e, "Unexpected decode failure");
                }
                self.driver.handle_malformed(&e)
            }
        }
    }

    async fn apply(&mut self, step: Step) -> Result<()> {
        for msg in step.outgoing {
            self.send(msg).await?;
        }
        if let Some(tx) = &self.events {
            for event in step.events {
                // a departed consumer does not stop the test
                let _ = tx.send(event);
            }
        }
        Ok(())
    }

    async fn send(&self, msg: ClientMessage) -> Result<()> {
        let frame = encode_client(&msg)?;
        self.transport.send_text(frame).await?;
        Ok(())
    }
}

impl<T: ?Sized> std::fmt::Debug for TestRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("phase", &self.driver.phase())
            .finish()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lanspeed_common::{Direction, SessionId};
    use lanspeed_core::protocol::{decode_client, encode_server, ChunkAck, TestResult};
    use lanspeed_core::{ServerMessage, SpeedSummary};
    use lanspeed_transport::MemoryTransport;

    use super::*;

    fn config() -> DriverConfig {
        DriverConfig {
            chunk_size: 64,
            window_size: 4,
            settle_delay: Duration::from_millis(100),
        }
    }

    async fn reply(server: &MemoryTransport, msg: &ServerMessage) {
        server.send_text(encode_server(msg).unwrap()).await.unwrap();
    }

    async fn expect(server: &MemoryTransport) -> ClientMessage {
        decode_client(&server.recv_text().await.unwrap().unwrap()).unwrap()
    }

    fn sid(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_upload_run() {
        let (client, server) = MemoryTransport::pair("client", "server");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = broadcast::channel(1);
        let mut runner = TestRunner::new(Arc::new(client), config()).unwrap().with_events(tx);

        let fake = tokio::spawn(async move {
            assert!(matches!(expect(&server).await, ClientMessage::TestStart(_)));
            reply(&server, &ServerMessage::started(Direction::Upload, sid("u1"))).await;
            for expected in 1..=3 {
                match expect(&server).await {
                    ClientMessage::UploadData(chunk) => {
                        assert_eq!(chunk.chunk_id, expected);
                        assert_eq!(chunk.data.len(), 64);
                    }
                    other => panic!("unexpected {other:?}"),
                }
                reply(
                    &server,
                    &ServerMessage::UploadAck(ChunkAck {
                        session_id: sid("u1"),
                        chunk_id: expected,
                        received_at: 0,
                    }),
                )
                .await;
            }
            reply(
                &server,
                &ServerMessage::TestResult(TestResult {
                    session_id: sid("u1"),
                    direction: Direction::Upload,
                    result: SpeedSummary::default(),
                }),
            )
            .await;
            server
        });

        let report = runner.run(TestKind::Upload, stop_rx).await.unwrap();
        assert_eq!(report.upload, Some(SpeedSummary::default()));
        let _server = fake.await.unwrap();

        let mut saw_complete = false;
        while let Ok(event) = rx.try_recv() {
            saw_complete |= matches!(event, DriverEvent::Complete(_));
        }
        assert!(saw_complete);
    }

    #[tokio::test]
    async fn test_rejected_run() {
        let (client, server) = MemoryTransport::pair("client", "server");
        let (_stop_tx, stop_rx) = broadcast::channel(1);
        let mut runner = TestRunner::new(Arc::new(client), config()).unwrap();

        tokio::spawn(async move {
            let _ = expect(&server).await;
            reply(&server, &ServerMessage::error("Session limit reached (1)")).await;
            server
        });

        let err = runner.run(TestKind::Download, stop_rx).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m.contains("limit")));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let (client, server) = MemoryTransport::pair("client", "server");
        let (_stop_tx, stop_rx) = broadcast::channel(1);
        let mut runner = TestRunner::new(Arc::new(client), config()).unwrap();
        server.close().await.unwrap();

        let err = runner.run(TestKind::Upload, stop_rx).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed | ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_stop_sends_test_stop() {
        let (client, server) = MemoryTransport::pair("client", "server");
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let mut runner = TestRunner::new(Arc::new(client), config()).unwrap();

        let fake = tokio::spawn(async move {
            let _ = expect(&server).await;
            reply(&server, &ServerMessage::started(Direction::Download, sid("d1"))).await;
            stop_tx.send(()).unwrap();
            server
        });

        let err = runner.run(TestKind::Download, stop_rx).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));

        let server = fake.await.unwrap();
        // the stop may race the download_start; only check what was sent
        while let Some(frame) = server.try_recv_text() {
            let msg = decode_client(&frame).unwrap();
            assert!(matches!(msg, ClientMessage::TestStop(ref s) if s.session_id.as_str() == "d1"));
        }
    }
}
