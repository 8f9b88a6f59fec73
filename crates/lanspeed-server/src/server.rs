// ============================================
// File: crates/lanspeed-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Main server implementation that binds the listener, serves each
//! connection and manages the server lifecycle.
//!
//! ## Main Functionality
//! - `Server`: Main server struct and lifecycle management
//! - `serve_peer()`: Reader loop and writer task of one connection
//! - Graceful shutdown handling
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐                                            │
//! │  │ Accept Task │──► WebSocket handshake ──► serve_peer()    │
//! │  └─────────────┘                                │           │
//! │                              ┌──────────────────┴────────┐  │
//! │                              ▼                           ▼  │
//! │                     ┌────────────────┐       ┌────────────┐ │
//! │                     │  Reader loop   │       │  Writer    │ │
//! │                     │ EventHandler   │       │  task      │ │
//! │                     └───────┬────────┘       └─────▲──────┘ │
//! │                             ▼                      │        │
//! │                     ┌────────────────┐             │        │
//! │                     │SessionRegistry │── PeerHandle┘        │
//! │                     └────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the writer task touches the sending half of a connection
//! - A dropped connection cancels its sessions; nothing is published
//! - Graceful shutdown waits up to 5s per task
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lanspeed_core::protocol::encode_server;
use lanspeed_transport::{FrameTransport, TransportError, WsTransport};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handlers::EventHandler;
use crate::services::{PeerHandle, PeerId, SessionRegistry};

/// Listen backlog for the accept socket.
const LISTEN_BACKLOG: i32 = 1024;

/// Per-task grace period during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// Server
// ============================================

/// Main LAN speed test server.
///
/// # Lifecycle
/// 1. Create with `Server::new(config)`
/// 2. Start with `server.run().await` (or `serve()` on a bound listener)
/// 3. Shutdown via Ctrl+C or `server.shutdown()`
pub struct Server {
    /// Server configuration.
    config: ServerConfig,
    /// Session registry shared with every connection.
    registry: Arc<SessionRegistry>,
    /// Address actually bound, once listening.
    local_addr: Mutex<Option<SocketAddr>>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Creates a new server instance.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(SessionRegistry::new(
            config.speed_test.clone(),
            config.max_sessions(),
        ));
        Self {
            config,
            registry,
            local_addr: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Binds the configured address and runs until shutdown.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound.
    pub async fn run(&self) -> Result<()> {
        info!("Starting LanSpeed server v{}", env!("CARGO_PKG_VERSION"));

        let listener = bind_listener(self.config.listen_addr())
            .map_err(|e| ServerError::startup_failed(e.to_string()))?;

        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    ///
    /// # Errors
    /// Returns error if the listener address cannot be read.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);

        info!(
            listen_addr = %addr,
            max_sessions = self.config.max_sessions(),
            "Speed test server listening"
        );
        match lan_address() {
            Some(ip) => info!("Reachable on the LAN at ws://{}:{}", ip, addr.port()),
            None => debug!("Could not determine LAN address"),
        }

        let handler = Arc::new(EventHandler::new(Arc::clone(&self.registry)));

        let mut tasks: Vec<(&str, JoinHandle<()>)> = Vec::new();
        tasks.push(("accept", self.spawn_accept_task(listener, handler)));

        info!("Server started successfully");

        self.wait_for_shutdown().await;

        info!("Shutting down server...");
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        for (name, task) in tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out during shutdown", name),
            }
        }

        *self.local_addr.lock() = None;
        info!("Server shutdown complete");
        Ok(())
    }

    /// Spawns the accept loop.
    fn spawn_accept_task(&self, listener: TcpListener, handler: Arc<EventHandler>) -> JoinHandle<()> {
        let shutdown = Arc::clone(&self.shutdown);
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut peers: Vec<JoinHandle<()>> = Vec::new();

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Accept task received shutdown signal");
                        break;
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, remote)) => {
                                if let Err(e) = stream.set_nodelay(true) {
                                    debug!("Failed to set TCP_NODELAY for {}: {}", remote, e);
                                }
                                let handler = Arc::clone(&handler);
                                let peer_shutdown = shutdown_tx.subscribe();
                                peers.retain(|task| !task.is_finished());
                                peers.push(tokio::spawn(async move {
                                    match WsTransport::accept(stream).await {
                                        Ok(transport) => {
                                            serve_peer(Arc::new(transport), handler, peer_shutdown).await;
                                        }
                                        Err(e) => debug!("Handshake with {} failed: {}", remote, e),
                                    }
                                }));
                            }
                            Err(e) => {
                                if !shutdown.load(Ordering::SeqCst) {
                                    error!("Accept error: {}", e);
                                }
                            }
                        }
                    }
                }
            }

            for task in peers {
                let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await;
            }
            debug!("Accept task exiting");
        })
    }

    /// Waits for Ctrl+C or a programmatic shutdown.
    async fn wait_for_shutdown(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    // keep serving until told otherwise
                    let _ = shutdown_rx.recv().await;
                }
            }
            _ = shutdown_rx.recv() => {}
        }
        info!("Received shutdown signal");
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Address the server is listening on, while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Session registry shared by all connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.network.listen_addr)
            .field("sessions", &self.registry.len())
            .finish()
    }
}

// ============================================
// Connection Handling
// ============================================

/// Serves one connected peer until it leaves or the server stops.
///
/// Inbound frames go to `handler` in arrival order. Outbound messages
/// queued on the peer's [`PeerHandle`] are encoded and sent by a
/// dedicated writer task.
pub async fn serve_peer<T>(
    transport: Arc<T>,
    handler: Arc<EventHandler>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    T: FrameTransport + ?Sized + 'static,
{
    let (peer, mut outbound) = PeerHandle::channel(PeerId::next());
    let peer_id = peer.id();
    info!(peer = %peer_id, remote = transport.peer(), "Peer connected");

    let writer = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                let frame = match encode_server(&msg) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(peer = %peer_id, error = %e, "Dropping unencodable message");
                        continue;
                    }
                };
                if let Err(e) = transport.send_text(frame).await {
                    if !e.is_closed() {
                        warn!(peer = %peer_id, error = %e, "Send failed");
                    }
                    break;
                }
            }
        })
    };

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(peer = %peer_id, "Closing peer for shutdown");
                break;
            }
            result = transport.recv_text() => {
                match result {
                    Ok(Some(frame)) => handler.handle_frame(&peer, &frame),
                    Ok(None) => break,
                    Err(e) => {
                        if !e.is_closed() {
                            debug!(peer = %peer_id, error = %e, "Receive failed");
                        }
                        break;
                    }
                }
            }
        }
    }

    let cancelled = handler.handle_disconnect(peer_id);
    drop(peer);
    writer.abort();
    let _ = writer.await;

    if let Err(e) = transport.close().await {
        debug!(peer = %peer_id, error = %e, "Close failed");
    }
    info!(peer = %peer_id, cancelled, "Peer disconnected");
}

// ============================================
// Socket Setup
// ============================================

/// Binds a reusable, non-blocking TCP listener.
///
/// # Errors
/// Returns `BindFailed` if any socket option or the bind itself fails.
pub fn bind_listener(addr: SocketAddr) -> std::result::Result<TcpListener, TransportError> {
    let fail = |e: std::io::Error| TransportError::bind_failed(addr, e.to_string());

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).map_err(fail)?;
    socket.set_reuse_address(true).map_err(fail)?;
    socket.set_nonblocking(true).map_err(fail)?;
    socket.bind(&addr.into()).map_err(fail)?;
    socket.listen(LISTEN_BACKLOG).map_err(fail)?;

    TcpListener::from_std(socket.into()).map_err(fail)
}

/// Best-effort LAN address of this host.
///
/// Connecting a UDP socket sends nothing; it only selects the outbound
/// interface.
fn lan_address() -> Option<std::net::IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("192.0.2.1", 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

// ============================================
// Tests
// ============================================
