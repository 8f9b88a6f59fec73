// ============================================
// File: crates/lanspeed-server/src/services/session.rs
// ============================================
//! # Test Session
//!
//! ## Creation Reason
//! Owns one upload or download measurement from start to result. The
//! state machine itself is synchronous: every input carries the
//! current `Instant` and every transition returns the events to send.
//! A small per-session task feeds it commands, progress ticks and the
//! watchdog deadline.
//!
//! ## Main Functionality
//! - `TestSession`: pure state machine
//! - `SessionCommand`: inputs forwarded from the peer's connection
//! - `drive()`: the per-session task loop
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────┐  start   ┌─────────┐  duration reached /   ┌───────────┐
//! │ Pending │ ───────► │ Running │ ─ generator empty ──► │ Completed │
//! └─────────┘          └────┬────┘                       └───────────┘
//!                           │
//!              ┌────────────┴─────────────┐
//!              ▼                          ▼
//!     duration + grace elapsed        test_stop /
//!              │                      disconnect
//!              ▼                          ▼
//!        ┌──────────┐               ┌───────────┐
//!        │ TimedOut │               │ Cancelled │
//!        └──────────┘               └───────────┘
//! ```
//! Completed and TimedOut both publish a `test_result`; Cancelled
//! publishes nothing.
//!
//! ## Download Flow Control
//! ```text
//!  server                       client
//!    │── download_data #n ───────►│
//!    │        (nothing else in flight)
//!    │◄────────── download_ack #n │
//!    │── download_data #n+1 ─────►│
//! ```
//! An ack whose chunk id is not the one in flight is ignored.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Completion is evaluated on data/ack events only. A silent peer is
//!   ended by the watchdog, never by the progress timer
//! - Sample intervals of zero length are dropped before any division
//! - Timers live inside `drive()`; leaving the loop cancels them
//!
//! ## Last Modified
//! v0.1.0 - Initial session state machine

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use lanspeed_common::time::{duration_millis, unix_millis};
use lanspeed_common::{Direction, SessionId};
use lanspeed_core::protocol::{ChunkAck, DataChunk, Progress, ServerMessage, TestResult};
use lanspeed_core::{calculate_speed, ChunkGenerator, SpeedEstimator, SpeedStats, SpeedSummary};

use crate::config::TestParams;
use crate::error::Result;
use crate::services::peer::PeerHandle;

// ============================================
// Session State
// ============================================

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Pending,
    /// Moving data.
    Running,
    /// Duration reached; result published.
    Completed,
    /// Watchdog fired; partial result published.
    TimedOut,
    /// Stopped by the peer or a disconnect; nothing published.
    Cancelled,
}

impl SessionState {
    /// Returns `true` once the session can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

// ============================================
// Session Commands
// ============================================

/// Input forwarded to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// An upload chunk arrived.
    UploadData {
        /// Id the peer gave the chunk
        chunk_id: u64,
        /// Decoded payload length, 0 if the data was unreadable
        bytes: u64,
    },
    /// The peer acknowledged a download chunk.
    DownloadAck {
        /// Id of the acknowledged chunk
        chunk_id: u64,
    },
    /// Stop without publishing a result.
    Cancel,
}

// ============================================
// TestSession
// ============================================

/// One directional measurement.
pub struct TestSession {
    id: SessionId,
    params: TestParams,
    state: SessionState,
    started_at: Option<Instant>,
    last_sample_at: Option<Instant>,
    bytes_transferred: u64,
    chunk_count: u64,
    estimator: SpeedEstimator,
    stats: SpeedStats,
    generator: Option<ChunkGenerator>,
    /// Download chunk awaiting its ack: (chunk id, length).
    outstanding: Option<(u64, u64)>,
    result: Option<SpeedSummary>,
}

impl TestSession {
    /// Creates a pending session.
    ///
    /// # Errors
    /// Returns a core error if the chunk size or window size is zero.
    pub fn new(id: SessionId, params: TestParams) -> Result<Self> {
        let generator = match params.direction {
            Direction::Upload => None,
            Direction::Download => Some(ChunkGenerator::new(
                params.download_total_bytes,
                params.chunk_size,
                params.fill_method,
            )?),
        };

        Ok(Self {
            estimator: SpeedEstimator::new(params.window_size)?,
            id,
            params,
            state: SessionState::Pending,
            started_at: None,
            last_sample_at: None,
            bytes_transferred: 0,
            chunk_count: 0,
            stats: SpeedStats::new(),
            generator,
            outstanding: None,
            result: None,
        })
    }

    // ========================================
    // Transitions
    // ========================================

    /// Starts the session: announces it and, for downloads, pushes the
    /// first chunk.
    pub fn start(&mut self, now: Instant) -> Vec<ServerMessage> {
        if self.state != SessionState::Pending {
            return Vec::new();
        }

        self.state = SessionState::Running;
        self.started_at = Some(now);
        self.last_sample_at = Some(now);

        let mut out = vec![ServerMessage::started(self.params.direction, self.id.clone())];
        if self.params.direction == Direction::Download {
            self.push_next_chunk(now, &mut out);
        }
        out
    }

    /// Handles one upload chunk: sample, ack, then check the clock.
    pub fn on_upload_data(&mut self, chunk_id: u64, bytes: u64, now: Instant) -> Vec<ServerMessage> {
        if !self.is_running_as(Direction::Upload) {
            return Vec::new();
        }

        if bytes > 0 {
            self.bytes_transferred += bytes;
            self.chunk_count += 1;
            self.sample(bytes, now);
        } else {
            self.last_sample_at = Some(now);
        }

        let mut out = vec![ServerMessage::UploadAck(ChunkAck {
            session_id: self.id.clone(),
            chunk_id,
            received_at: unix_millis(),
        })];

        if self.elapsed(now) >= self.params.duration {
            out.push(self.finish(SessionState::Completed, now));
        }
        out
    }

    /// Handles a download ack: sample, then either finish or send the
    /// next chunk.
    pub fn on_download_ack(&mut self, chunk_id: u64, now: Instant) -> Vec<ServerMessage> {
        if !self.is_running_as(Direction::Download) {
            return Vec::new();
        }

        let Some((expected, len)) = self.outstanding else {
            debug!(session_id = %self.id, chunk_id, "Ack with nothing in flight, ignored");
            return Vec::new();
        };
        if expected != chunk_id {
            debug!(
                session_id = %self.id,
                chunk_id,
                expected,
                "Ack for a chunk not in flight, ignored"
            );
            return Vec::new();
        }

        self.outstanding = None;
        self.bytes_transferred += len;
        self.sample(len, now);

        let mut out = Vec::with_capacity(1);
        if self.elapsed(now) >= self.params.duration {
            out.push(self.finish(SessionState::Completed, now));
        } else {
            self.push_next_chunk(now, &mut out);
        }
        out
    }

    /// Progress snapshot, `None` unless running.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, now: Instant) -> Option<ServerMessage> {
        if self.state != SessionState::Running {
            return None;
        }

        let elapsed = self.elapsed(now).as_secs_f64();
        let total = self.params.duration.as_secs_f64();
        let progress = if total > 0.0 {
            (elapsed / total * 100.0).min(100.0)
        } else {
            100.0
        };

        Some(ServerMessage::TestProgress(Progress {
            session_id: self.id.clone(),
            direction: self.params.direction,
            progress,
            current_speed: self.estimator.current_speed(),
            bytes_transferred: self.bytes_transferred,
        }))
    }

    /// Watchdog expiry: force-completes with whatever was measured.
    pub fn time_out(&mut self, now: Instant) -> Vec<ServerMessage> {
        if self.state != SessionState::Running {
            return Vec::new();
        }
        vec![self.finish(SessionState::TimedOut, now)]
    }

    /// Stops the session without a result.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Cancelled;
            self.outstanding = None;
        }
    }

    // ========================================
    // Internals
    // ========================================

    fn is_running_as(&self, direction: Direction) -> bool {
        self.state == SessionState::Running && self.params.direction == direction
    }

    fn elapsed(&self, now: Instant) -> std::time::Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    fn sample(&mut self, bytes: u64, now: Instant) {
        let last = self.last_sample_at.unwrap_or(now);
        let elapsed_ms = duration_millis(now.saturating_duration_since(last));
        self.last_sample_at = Some(now);

        if self.estimator.add_sample(bytes, elapsed_ms) {
            self.stats.record(calculate_speed(bytes, elapsed_ms));
        }
    }

    fn push_next_chunk(&mut self, now: Instant, out: &mut Vec<ServerMessage>) {
        let next = self.generator.as_mut().and_then(ChunkGenerator::next_chunk);
        match next {
            Some(data) => {
                self.chunk_count += 1;
                let chunk_id = self.chunk_count;
                self.outstanding = Some((chunk_id, data.len() as u64));
                out.push(ServerMessage::DownloadData(DataChunk {
                    session_id: self.id.clone(),
                    chunk_id,
                    data,
                }));
            }
            None => out.push(self.finish(SessionState::Completed, now)),
        }
    }

    fn finish(&mut self, state: SessionState, now: Instant) -> ServerMessage {
        let duration_ms = duration_millis(self.elapsed(now));
        let summary = self.stats.summarize(self.bytes_transferred, duration_ms);

        self.state = state;
        self.outstanding = None;
        self.result = Some(summary);

        ServerMessage::TestResult(TestResult {
            session_id: self.id.clone(),
            direction: self.params.direction,
            result: summary,
        })
    }

    // ========================================
    // Accessors
    // ========================================

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Leg direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.params.direction
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes counted so far.
    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Chunks received (upload) or sent (download).
    #[must_use]
    pub const fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Download chunk id awaiting an ack.
    #[must_use]
    pub fn outstanding(&self) -> Option<u64> {
        self.outstanding.map(|(id, _)| id)
    }

    /// Instant at which the watchdog fires, once started.
    #[must_use]
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.started_at.map(|start| start + self.params.watchdog_after())
    }

    /// Final statistics, once finished.
    #[must_use]
    pub const fn result(&self) -> Option<SpeedSummary> {
        self.result
    }
}

impl std::fmt::Debug for TestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("id", &self.id)
            .field("direction", &self.params.direction)
            .field("state", &self.state)
            .field("bytes_transferred", &self.bytes_transferred)
            .field("chunk_count", &self.chunk_count)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

// ============================================
// Session Task
// ============================================

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Session id.
    pub id: SessionId,
    /// Leg direction.
    pub direction: Direction,
    /// Terminal state.
    pub state: SessionState,
    /// Published statistics; `None` when cancelled.
    pub result: Option<SpeedSummary>,
    /// Bytes counted.
    pub bytes_transferred: u64,
}

/// Runs `session` until it reaches a terminal state.
///
/// Commands come from the registry; outbound events go to `peer`. A
/// closed command channel counts as a cancel.
pub async fn drive(
    mut session: TestSession,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    peer: PeerHandle,
) -> SessionOutcome {
    let started = Instant::now();
    peer.send_all(session.start(started));
    info!(
        session_id = %session.id(),
        direction = %session.direction(),
        peer = %peer.id(),
        "Session started"
    );

    let period = session.params.progress_interval;
    let mut ticker = time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let deadline = session
        .watchdog_deadline()
        .unwrap_or_else(|| started + session.params.watchdog_after());
    let watchdog = time::sleep_until(deadline);
    tokio::pin!(watchdog);

    while !session.state().is_terminal() {
        tokio::select! {
            cmd = commands.recv() => {
                let now = Instant::now();
                match cmd {
                    Some(SessionCommand::UploadData { chunk_id, bytes }) => {
                        peer.send_all(session.on_upload_data(chunk_id, bytes, now));
                    }
                    Some(SessionCommand::DownloadAck { chunk_id }) => {
                        peer.send_all(session.on_download_ack(chunk_id, now));
                    }
                    Some(SessionCommand::Cancel) | None => session.cancel(),
                }
            }
            _ = ticker.tick() => {
                if let Some(msg) = session.progress(Instant::now()) {
                    peer.send(msg);
                }
            }
            () = &mut watchdog => {
                info!(
                    session_id = %session.id(),
                    bytes = session.bytes_transferred(),
                    "Watchdog fired, completing with partial data"
                );
                peer.send_all(session.time_out(Instant::now()));
            }
        }
    }

    info!(
        session_id = %session.id(),
        state = %session.state(),
        bytes = session.bytes_transferred(),
        chunks = session.chunk_count(),
        "Session finished"
    );

    SessionOutcome {
        id: session.id.clone(),
        direction: session.direction(),
        state: session.state(),
        result: session.result(),
        bytes_transferred: session.bytes_transferred(),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::SpeedTestConfig;
    use crate::services::peer::PeerId;

    const MIB: u64 = 1_048_576;

    fn params(direction: Direction) -> TestParams {
        let config = SpeedTestConfig {
            chunk_size: MIB as usize,
            upload_duration_ms: 1_000,
            download_duration_ms: 1_000,
            max_speed_mbps: 4.0,
            ..SpeedTestConfig::default()
        };
        config.params(direction)
    }

    fn session(direction: Direction) -> TestSession {
        TestSession::new("s".parse().unwrap(), params(direction)).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_upload_start_announces_only() {
        let mut s = session(Direction::Upload);
        let out = s.start(Instant::now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event(), "upload_start");
        assert_eq!(s.state(), SessionState::Running);
    }

    #[test]
    fn test_upload_acks_every_chunk() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);

        let out = s.on_upload_data(1, MIB, t0 + ms(100));
        assert!(matches!(&out[..], [ServerMessage::UploadAck(a)] if a.chunk_id == 1));
        let out = s.on_upload_data(2, MIB, t0 + ms(200));
        assert!(matches!(&out[..], [ServerMessage::UploadAck(a)] if a.chunk_id == 2));
        assert_eq!(s.bytes_transferred(), 2 * MIB);
        assert_eq!(s.chunk_count(), 2);
    }

    #[test]
    fn test_upload_completes_on_duration() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);
        s.on_upload_data(1, MIB, t0 + ms(500));
        let out = s.on_upload_data(2, MIB, t0 + ms(1_000));

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].event(), "test_result");
        assert_eq!(s.state(), SessionState::Completed);

        let result = s.result().unwrap();
        assert_eq!(result.duration_ms, 1_000);
        assert!((result.average_speed - 2.0).abs() < 1e-9);
        assert!(result.min_speed <= result.average_speed);
        assert!(result.average_speed <= result.max_speed);

        assert!(s.on_upload_data(3, MIB, t0 + ms(1_100)).is_empty());
    }

    #[test]
    fn test_zero_interval_sample_is_discarded() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);
        s.on_upload_data(1, MIB, t0);
        assert_eq!(s.bytes_transferred(), MIB);
        match s.progress(t0).unwrap() {
            ServerMessage::TestProgress(p) => assert_eq!(p.current_speed, 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_upload_chunk_still_acked() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);
        let out = s.on_upload_data(1, 0, t0 + ms(10));
        assert_eq!(out.len(), 1);
        assert_eq!(s.bytes_transferred(), 0);
    }

    #[test]
    fn test_download_window_of_one() {
        let t0 = Instant::now();
        let mut s = session(Direction::Download);
        let out = s.start(t0);
        assert_eq!(out[0].event(), "download_start");
        assert!(matches!(&out[1], ServerMessage::DownloadData(c) if c.chunk_id == 1));
        assert_eq!(s.outstanding(), Some(1));

        // stray and duplicate acks change nothing
        assert!(s.on_download_ack(7, t0 + ms(10)).is_empty());
        assert_eq!(s.outstanding(), Some(1));

        let out = s.on_download_ack(1, t0 + ms(100));
        assert!(matches!(&out[..], [ServerMessage::DownloadData(c)] if c.chunk_id == 2));
        assert!(s.on_download_ack(1, t0 + ms(110)).is_empty());
        assert_eq!(s.bytes_transferred(), MIB);
    }

    #[test]
    fn test_download_stops_when_generator_exhausted() {
        let t0 = Instant::now();
        let mut p = params(Direction::Download);
        p.download_total_bytes = 2 * MIB;
        let mut s = TestSession::new("d".parse().unwrap(), p).unwrap();
        s.start(t0);
        s.on_download_ack(1, t0 + ms(10));
        let out = s.on_download_ack(2, t0 + ms(20));
        assert!(matches!(&out[..], [ServerMessage::TestResult(_)]));
        assert_eq!(s.state(), SessionState::Completed);
        assert_eq!(s.bytes_transferred(), 2 * MIB);
    }

    #[test]
    fn test_timeout_without_samples() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);
        let out = s.time_out(t0 + ms(6_000));
        match &out[..] {
            [ServerMessage::TestResult(r)] => {
                assert_eq!(r.result.min_speed, 0.0);
                assert_eq!(r.result.duration_ms, 6_000);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.state(), SessionState::TimedOut);
        assert!(s.progress(t0 + ms(6_100)).is_none());
    }

    #[test]
    fn test_progress_is_capped() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        assert!(s.progress(t0).is_none());
        s.start(t0);
        match s.progress(t0 + ms(5_000)).unwrap() {
            ServerMessage::TestProgress(p) => assert_eq!(p.progress, 100.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancel_publishes_nothing() {
        let t0 = Instant::now();
        let mut s = session(Direction::Download);
        s.start(t0);
        s.cancel();
        assert_eq!(s.state(), SessionState::Cancelled);
        assert!(s.result().is_none());
        assert!(s.time_out(t0 + ms(10_000)).is_empty());
        assert!(s.on_download_ack(1, t0 + ms(10)).is_empty());
    }

    #[test]
    fn test_bytes_never_decrease() {
        let t0 = Instant::now();
        let mut s = session(Direction::Upload);
        s.start(t0);
        let mut last = 0;
        for i in 1..=5 {
            s.on_upload_data(i, if i % 2 == 0 { 0 } else { MIB }, t0 + ms(i * 50));
            assert!(s.bytes_transferred() >= last);
            last = s.bytes_transferred();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_watchdog_times_out_silent_peer() {
        let (peer, mut rx) = PeerHandle::channel(PeerId::new(1));
        let (_tx, commands) = mpsc::unbounded_channel();
        let s = session(Direction::Upload);

        let started = Instant::now();
        let outcome = drive(s, commands, peer).await;

        assert_eq!(outcome.state, SessionState::TimedOut);
        assert_eq!(outcome.result.unwrap().min_speed, 0.0);
        assert!(started.elapsed() >= Duration::from_millis(6_000));
        assert!(started.elapsed() < Duration::from_millis(6_100));

        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            events.push(msg.event());
        }
        assert_eq!(events.first(), Some(&"upload_start"));
        assert_eq!(events.last(), Some(&"test_result"));
        assert!(events.iter().filter(|e| **e == "test_progress").count() >= 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_cancel() {
        let (peer, mut rx) = PeerHandle::channel(PeerId::new(1));
        let (tx, commands) = mpsc::unbounded_channel();
        tx.send(SessionCommand::Cancel).unwrap();

        let outcome = drive(session(Direction::Download), commands, peer).await;
        assert_eq!(outcome.state, SessionState::Cancelled);
        assert!(outcome.result.is_none());

        while let Ok(msg) = rx.try_recv() {
            assert_ne!(msg.event(), "test_result");
        }
    }
}
