// ============================================
// File: crates/lanspeed-server/src/services/registry.rs
// ============================================
//! # Session Registry
//!
//! ## Creation Reason
//! Routes peer events to the session they name and owns the lifecycle
//! of session tasks: creation, composite sequencing, cancellation and
//! deregistration.
//!
//! ## Main Functionality
//! - `SessionRegistry::start()`: one leg, or both legs in sequence
//! - `forward()`: deliver a command to the owning peer's session
//! - `cancel()` / `cancel_peer()`: stop one or all of a peer's sessions
//! - `last_results()`: latest summary per direction for a peer
//!
//! ## Composite Sequencing
//! ```text
//!  test_start {both}
//!        │
//!        ▼
//!  <req>-upload ── runs ──► result ──► settle delay ──► <req>-download
//!        │                                  │                │
//!        └── cancelled: no download leg ◄───┴── stop ◄───────┘
//! ```
//!
//! A composite stays pending under its request id until the download
//! leg is registered. `test_stop` naming the request or either leg
//! removes it, and the orchestrator then ends without a download leg.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never iterate the map while mutating it: collect ids, then act
//! - The registry holds command senders only; a session deregisters
//!   itself when its task ends
//! - Commands from a peer that does not own the session are treated
//!   like stray events and dropped
//! - The session cap is enforced by `active`, reserved before insert and
//!   released on deregister; `sessions.len()` is only a snapshot
//!
//! ## Last Modified
//! v0.1.0 - Initial session registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lanspeed_common::{Direction, SessionId, TestKind};
use lanspeed_core::{ServerMessage, SpeedSummary};

use crate::config::SpeedTestConfig;
use crate::error::{Result, ServerError};
use crate::services::peer::{PeerHandle, PeerId};
use crate::services::session::{drive, SessionCommand, SessionOutcome, SessionState, TestSession};

// ============================================
// Registry Entries
// ============================================

struct SessionEntry {
    peer: PeerId,
    direction: Direction,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

/// A composite test whose download leg is not registered yet.
struct PendingComposite {
    peer: PeerId,
    request: SessionId,
    // dropping this wakes the orchestrator
    _stop: oneshot::Sender<()>,
}

/// Latest published summaries of one peer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeerResults {
    /// Most recent upload summary.
    pub upload: Option<SpeedSummary>,
    /// Most recent download summary.
    pub download: Option<SpeedSummary>,
}

impl PeerResults {
    fn record(&mut self, direction: Direction, summary: SpeedSummary) {
        match direction {
            Direction::Upload => self.upload = Some(summary),
            Direction::Download => self.download = Some(summary),
        }
    }
}

// ============================================
// SessionRegistry
// ============================================

/// Registry of running sessions, owned by the server.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    /// Keyed by request id.
    pending: DashMap<String, PendingComposite>,
    results: DashMap<PeerId, PeerResults>,
    active: AtomicUsize,
    config: SpeedTestConfig,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: SpeedTestConfig, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            pending: DashMap::new(),
            results: DashMap::new(),
            active: AtomicUsize::new(0),
            config,
            max_sessions,
        }
    }

    // ========================================
    // Creation
    // ========================================

    /// Starts the test `kind` for `peer` under a fresh request id.
    ///
    /// # Errors
    /// Returns `SessionLimitReached` if the registry is full.
    pub fn start(self: &Arc<Self>, peer: &PeerHandle, kind: TestKind) -> Result<SessionId> {
        let request = SessionId::generate();
        match kind {
            TestKind::Upload => {
                self.start_single(peer, request.clone(), Direction::Upload)?;
            }
            TestKind::Download => {
                self.start_single(peer, request.clone(), Direction::Download)?;
            }
            TestKind::Both => self.start_composite(peer, request.clone())?,
        }
        Ok(request)
    }

    /// Registers and spawns one session.
    ///
    /// # Errors
    /// - `SessionLimitReached` if the registry is full
    /// - `SessionExists` if `id` is already registered
    pub fn start_single(
        self: &Arc<Self>,
        peer: &PeerHandle,
        id: SessionId,
        direction: Direction,
    ) -> Result<JoinHandle<SessionOutcome>> {
        let session = TestSession::new(id.clone(), self.config.params(direction))?;
        self.reserve_slot()?;
        let (tx, rx) = mpsc::unbounded_channel();

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => {
                self.release_slot();
                return Err(ServerError::SessionExists(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    peer: peer.id(),
                    direction,
                    commands: tx,
                });
            }
        }

        info!(session_id = %id, direction = %direction, peer = %peer.id(), "Session registered");

        let registry = Arc::clone(self);
        let peer = peer.clone();
        Ok(tokio::spawn(async move {
            let outcome = drive(session, rx, peer.clone()).await;
            registry.deregister(&peer, &outcome);
            outcome
        }))
    }

    /// Runs the upload leg, then the download leg after the settle
    /// delay. Leg ids are `<request>-upload` and `<request>-download`.
    ///
    /// # Errors
    /// Returns error if the upload leg cannot be registered.
    pub fn start_composite(self: &Arc<Self>, peer: &PeerHandle, request: SessionId) -> Result<()> {
        let upload = self.start_single(peer, request.leg(Direction::Upload), Direction::Upload)?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        self.pending.insert(
            request.as_str().to_string(),
            PendingComposite {
                peer: peer.id(),
                request: request.clone(),
                _stop: stop_tx,
            },
        );

        let registry = Arc::clone(self);
        let peer = peer.clone();
        let settle = self.config.settle_delay();
        tokio::spawn(async move {
            let outcome = match upload.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(request = %request, error = %e, "Upload leg task failed");
                    registry.pending.remove(request.as_str());
                    return;
                }
            };

            if outcome.state == SessionState::Cancelled {
                debug!(request = %request, "Upload leg cancelled, skipping download leg");
                registry.pending.remove(request.as_str());
                return;
            }

            tokio::select! {
                () = tokio::time::sleep(settle) => {}
                _ = &mut stop_rx => {
                    debug!(request = %request, "Stopped between legs, skipping download leg");
                    return;
                }
            }

            // first remover wins against cancel(); no await until the
            // download leg is registered
            if registry.pending.remove(request.as_str()).is_none() || peer.is_closed() {
                return;
            }

            let download = request.leg(Direction::Download);
            if let Err(e) = registry.start_single(&peer, download, Direction::Download) {
                warn!(request = %request, error = %e, "Could not start download leg");
                peer.send(ServerMessage::error(e.to_string()));
            }
        });

        Ok(())
    }

    fn reserve_slot(&self) -> Result<()> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_sessions).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| ServerError::SessionLimitReached {
                limit: self.max_sessions,
            })
    }

    fn release_slot(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    fn deregister(&self, peer: &PeerHandle, outcome: &SessionOutcome) {
        if self.sessions.remove(&outcome.id).is_some() {
            self.release_slot();
        }

        if let Some(summary) = outcome.result {
            if !peer.is_closed() {
                self.results
                    .entry(peer.id())
                    .or_default()
                    .record(outcome.direction, summary);
            }
        }

        debug!(
            session_id = %outcome.id,
            state = %outcome.state,
            remaining = self.sessions.len(),
            "Session deregistered"
        );
    }

    // ========================================
    // Routing
    // ========================================

    /// Delivers `command` to session `id` if `peer` owns it.
    ///
    /// Returns `false` for unknown sessions, foreign sessions and
    /// sessions that already ended.
    pub fn forward(&self, peer: PeerId, id: &SessionId, command: SessionCommand) -> bool {
        let Some(entry) = self.sessions.get(id) else {
            return false;
        };
        if entry.peer != peer {
            return false;
        }
        entry.commands.send(command).is_ok()
    }

    /// Cancels session `id` on behalf of `peer`.
    ///
    /// `id` may also name a pending composite test, by its request id
    /// or by either leg id; the download leg is then never started.
    pub fn cancel(&self, peer: PeerId, id: &SessionId) -> bool {
        let session = self.forward(peer, id, SessionCommand::Cancel);
        let composite = self.cancel_composite(peer, id.request_id());
        session || composite
    }

    fn cancel_composite(&self, peer: PeerId, request: &str) -> bool {
        let Some((_, pending)) = self.pending.remove_if(request, |_, p| p.peer == peer) else {
            return false;
        };
        // the upload leg may still be running
        self.forward(peer, &pending.request.leg(Direction::Upload), SessionCommand::Cancel);
        info!(peer = %peer, request = %pending.request, "Composite test cancelled");
        true
    }

    /// Cancels every session owned by `peer` and forgets its results.
    ///
    /// Returns the number of sessions cancelled.
    pub fn cancel_peer(&self, peer: PeerId) -> usize {
        let owned = self.sessions_of(peer);

        let cancelled = owned
            .iter()
            .filter(|id| self.forward(peer, id, SessionCommand::Cancel))
            .count();

        self.pending.retain(|_, p| p.peer != peer);
        self.results.remove(&peer);

        if cancelled > 0 {
            info!(peer = %peer, cancelled, "Cancelled sessions of departed peer");
        }
        cancelled
    }

    // ========================================
    // Queries
    // ========================================

    /// Ids of sessions owned by `peer`.
    #[must_use]
    pub fn sessions_of(&self, peer: PeerId) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().peer == peer)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Direction of a registered session.
    #[must_use]
    pub fn direction_of(&self, id: &SessionId) -> Option<Direction> {
        self.sessions.get(id).map(|entry| entry.direction)
    }

    /// Latest summaries published to `peer`.
    #[must_use]
    pub fn last_results(&self, peer: PeerId) -> PeerResults {
        self.results.get(&peer).map(|r| *r).unwrap_or_default()
    }

    /// Returns `true` if the composite test named by `id` (request or
    /// leg id) has not started its download leg yet.
    #[must_use]
    pub fn is_pending(&self, id: &SessionId) -> bool {
        self.pending.contains_key(id.request_id())
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Measurement configuration.
    #[must_use]
    pub const fn config(&self) -> &SpeedTestConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("pending", &self.pending.len())
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
