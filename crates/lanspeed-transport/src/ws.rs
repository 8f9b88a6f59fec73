// ============================================
// File: crates/lanspeed-transport/src/ws.rs
// ============================================
//! # WebSocket Transport
//!
//! ## Creation Reason
//! Production channel between a browser-less client and the server:
//! one WebSocket connection, one JSON event per text frame.
//!
//! ## Main Functionality
//! - `WsTransport::accept()`: server-side upgrade of a TCP stream
//! - `WsTransport::connect()`: client-side connect to a `ws://` URL
//! - Split sink/stream halves so reads and writes proceed concurrently
//!
//! ## Frame Handling
//! ```text
//!  Text(s)     → Some(s)
//!  Binary(b)   → Some(utf8(b)) or ReceiveFailed
//!  Ping/Pong   → skipped, replies handled by tungstenite
//!  Close / EOF → None
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each half sits behind its own async mutex; never hold both
//!
//! ## Last Modified
//! v0.1.0 - Initial WebSocket transport

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::FrameTransport;

// ============================================
// WsTransport
// ============================================

/// Text-frame transport over a WebSocket.
pub struct WsTransport<S> {
    peer: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl WsTransport<TcpStream> {
    /// Performs the server side of the WebSocket upgrade.
    ///
    /// # Errors
    /// Returns `HandshakeFailed` if the peer does not speak WebSocket.
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |a| a.to_string());

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::HandshakeFailed {
                peer: peer.clone(),
                reason: e.to_string(),
            })?;

        debug!(peer = %peer, "WebSocket upgrade complete");
        Ok(Self::from_stream(ws, peer))
    }
}

impl WsTransport<MaybeTlsStream<TcpStream>> {
    /// Connects to a server at `url` (`ws://host:port/`).
    ///
    /// # Errors
    /// Returns `ConnectFailed` if the server is unreachable or refuses
    /// the upgrade.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::connect_failed(url, e.to_string()))?;

        debug!(url = %url, "Connected");
        Ok(Self::from_stream(ws, url.to_string()))
    }
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established WebSocket.
    pub fn from_stream(ws: WebSocketStream<S>, peer: impl Into<String>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            peer: peer.into(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl<S> FrameTransport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&self, frame: String) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(TransportError::from_send)
    }

    async fn recv_text(&self) -> Result<Option<String>> {
        let mut stream = self.stream.lock().await;
        loop {
            let Some(next) = stream.next().await else {
                return Ok(None);
            };

            match next {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return String::from_utf8(bytes).map(Some).map_err(|_| {
                        TransportError::ReceiveFailed {
                            reason: "binary frame is not UTF-8".into(),
                        }
                    });
                }
                Ok(Message::Close(frame)) => {
                    debug!(peer = %self.peer, ?frame, "Close frame received");
                    return Ok(None);
                }
                Ok(other) => {
                    trace!(peer = %self.peer, kind = ?other, "Skipping control frame");
                }
                Err(e) => {
                    let err = TransportError::from_recv(e);
                    return if err.is_closed() { Ok(None) } else { Err(err) };
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        match self.sink.lock().await.close().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = TransportError::from_send(e);
                if err.is_closed() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

impl<S> std::fmt::Debug for WsTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
