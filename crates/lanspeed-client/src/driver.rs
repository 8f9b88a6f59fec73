// ============================================
// File: crates/lanspeed-client/src/driver.rs
// ============================================
//! # Peer Test Driver
//!
//! ## Creation Reason
//! Client half of the throughput test. Like the server session it is a
//! synchronous state machine: each input carries the current `Instant`
//! and returns a [`Step`] with the messages to send and the display
//! events to emit. The runner owns all I/O.
//!
//! ## Main Functionality
//! - Upload: one randomized buffer per leg, next chunk sent on each ack
//! - Download: every chunk acknowledged, damaged ones included when
//!   their chunk id survives
//! - Local sliding-window speed for live display
//! - Composite tests: falls back to requesting the download leg itself
//!   if the server does not start it
//!
//! ## Driver Phases
//! ```text
//!  start(kind)
//!      │
//!      ▼
//! ┌───────────────┐ *_start ┌────────────────────────┐ test_result ┌──────────┐
//! │ AwaitingStart │ ──────► │ Uploading/Downloading  │ ──────────► │ Finished │
//! └───────▲───────┘         └───────────┬────────────┘             └──────────┘
//!         │                             │ upload result of `both`
//!         │ fallback timer              ▼
//!         └───────────────────── ┌──────────┐ download_start
//!                                │ Settling │ ───────────► Downloading
//!                                └──────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Exactly one upload chunk is in flight at a time
//! - Local speeds are display only; the server's `test_result` is the
//!   authoritative figure
//!
//! ## Last Modified
//! v0.1.0 - Initial driver state machine

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info};

use lanspeed_common::time::{duration_millis, unix_millis};
use lanspeed_common::{Direction, SessionId, TestKind};
use lanspeed_core::measure::{filler, DEFAULT_CHUNK_SIZE, DEFAULT_WINDOW_SIZE};
use lanspeed_core::protocol::{ChunkAck, DataChunk, TestStart, TestStop};
use lanspeed_core::{
    ClientMessage, CoreError, FillMethod, ServerMessage, SpeedEstimator, SpeedSummary,
};

use crate::error::{ClientError, Result};

/// Default pause the server takes between composite legs.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

// ============================================
// Configuration
// ============================================

/// Client-side test parameters.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// Samples in the local speed window.
    pub window_size: usize,
    /// Expected pause between composite legs. The driver requests the
    /// download leg itself after twice this long.
    pub settle_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

// ============================================
// Output
// ============================================

/// Final figures of one test run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestReport {
    /// What was requested.
    pub kind: Option<TestKind>,
    /// Server summary of the upload leg.
    pub upload: Option<SpeedSummary>,
    /// Server summary of the download leg.
    pub download: Option<SpeedSummary>,
    /// Wall time from request to last result.
    pub elapsed: Duration,
}

impl TestReport {
    fn record(&mut self, direction: Direction, summary: SpeedSummary) {
        match direction {
            Direction::Upload => self.upload = Some(summary),
            Direction::Download => self.download = Some(summary),
        }
    }
}

/// Event for whatever displays the test.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// The server opened a leg.
    LegStarted {
        /// Leg direction
        direction: Direction,
        /// Session id of the leg
        session_id: SessionId,
    },
    /// Locally measured speed after a chunk, MB/s.
    SpeedUpdate {
        /// Leg direction
        direction: Direction,
        /// Smoothed speed
        speed: f64,
    },
    /// Server progress report.
    Progress {
        /// Leg direction
        direction: Direction,
        /// Percent of the test duration elapsed
        progress: f64,
        /// Server-side smoothed speed, MB/s
        current_speed: f64,
        /// Bytes counted by the server
        bytes_transferred: u64,
    },
    /// The server published a leg's summary.
    LegFinished {
        /// Leg direction
        direction: Direction,
        /// Server summary
        result: SpeedSummary,
    },
    /// Every requested leg has finished.
    Complete(TestReport),
    /// The server sent an `error` event.
    ServerError(String),
}

/// Messages to send and events to emit after one input.
#[derive(Debug, Default)]
pub struct Step {
    /// Outbound messages, in order.
    pub outgoing: Vec<ClientMessage>,
    /// Display events, in order.
    pub events: Vec<DriverEvent>,
}

impl Step {
    fn send(&mut self, msg: ClientMessage) {
        self.outgoing.push(msg);
    }

    fn emit(&mut self, event: DriverEvent) {
        self.events.push(event);
    }

    /// Returns `true` if nothing needs doing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.events.is_empty()
    }
}

// ============================================
// Phase
// ============================================

/// Where the driver is in a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No test requested yet.
    Idle,
    /// Waiting for the server to open a leg.
    AwaitingStart(Direction),
    /// Upload leg running.
    Uploading,
    /// Download leg running.
    Downloading,
    /// Between the legs of a composite test.
    Settling,
    /// All requested legs finished.
    Finished,
    /// Stopped by the server or the user.
    Aborted,
}

impl Phase {
    /// Returns `true` once no further input is expected.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

// ============================================
// PeerDriver
// ============================================

/// Client-side test state machine.
#[derive(Debug)]
pub struct PeerDriver {
    config: DriverConfig,
    kind: Option<TestKind>,
    phase: Phase,
    started_at: Option<Instant>,

    /// Session id of the first leg, used to recognise the second.
    request: Option<SessionId>,
    /// Session id of the running leg.
    session: Option<SessionId>,

    buffer: Option<Bytes>,
    chunk_id: u64,
    in_flight: Option<u64>,
    last_sample_at: Option<Instant>,
    /// Bytes seen since the last accepted sample.
    pending_bytes: u64,
    bytes: u64,
    estimator: SpeedEstimator,

    fallback_at: Option<Instant>,
    fallback_sent: bool,

    report: TestReport,
    failure: Option<String>,
}

impl PeerDriver {
    /// Creates an idle driver.
    ///
    /// # Errors
    /// Returns a core error if `window_size` is zero.
    pub fn new(config: DriverConfig) -> Result<Self> {
        Ok(Self {
            estimator: SpeedEstimator::new(config.window_size)?,
            config,
            kind: None,
            phase: Phase::Idle,
            started_at: None,
            request: None,
            session: None,
            buffer: None,
            chunk_id: 0,
            in_flight: None,
            last_sample_at: None,
            pending_bytes: 0,
            bytes: 0,
            fallback_at: None,
            fallback_sent: false,
            report: TestReport::default(),
            failure: None,
        })
    }

    // ========================================
    // Control
    // ========================================

    /// Begins a test and returns the request to send.
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if a test is in progress.
    pub fn start(&mut self, kind: TestKind, now: Instant) -> Result<ClientMessage> {
        if !matches!(self.phase, Phase::Idle) && !self.phase.is_done() {
            return Err(ClientError::AlreadyRunning);
        }

        self.reset_leg();
        self.kind = Some(kind);
        self.phase = Phase::AwaitingStart(kind.legs()[0]);
        self.started_at = Some(now);
        self.request = None;
        self.fallback_at = None;
        self.fallback_sent = false;
        self.report = TestReport {
            kind: Some(kind),
            ..TestReport::default()
        };
        self.failure = None;

        info!(kind = %kind, "Requesting speed test");
        Ok(ClientMessage::TestStart(TestStart::new(kind)))
    }

    /// Abandons the test. Returns the stop request for the running leg,
    /// or for the first leg while a composite test is between legs.
    pub fn cancel(&mut self) -> Option<ClientMessage> {
        if self.phase.is_done() || self.phase == Phase::Idle {
            return None;
        }
        let running = self.session.take();
        // the server still holds the pending download leg under the
        // upload leg's request
        let target = if self.phase == Phase::Settling {
            self.request.clone()
        } else {
            running
        };

        self.phase = Phase::Aborted;
        self.fallback_at = None;
        self.reset_leg();
        target.map(|session_id| ClientMessage::TestStop(TestStop { session_id }))
    }

    // ========================================
    // Inputs
    // ========================================

    /// Handles one decoded server message.
    pub fn handle(&mut self, msg: ServerMessage, now: Instant) -> Step {
        let mut step = Step::default();
        match msg {
            ServerMessage::UploadStart(started) => {
                self.on_leg_start(Direction::Upload, started.session_id, now, &mut step);
            }
            ServerMessage::DownloadStart(started) => {
                self.on_leg_start(Direction::Download, started.session_id, now, &mut step);
            }
            ServerMessage::UploadAck(ack) => self.on_upload_ack(&ack, now, &mut step),
            ServerMessage::DownloadData(chunk) => self.on_download_data(&chunk, now, &mut step),
            ServerMessage::TestProgress(progress) => {
                if self.is_current(&progress.session_id) {
                    step.emit(DriverEvent::Progress {
                        direction: progress.direction,
                        progress: progress.progress,
                        current_speed: progress.current_speed,
                        bytes_transferred: progress.bytes_transferred,
                    });
                }
            }
            ServerMessage::TestResult(result) => {
                if self.is_current(&result.session_id) {
                    self.on_result(result.direction, result.result, now, &mut step);
                } else {
                    debug!(session_id = %result.session_id, "Result for another session ignored");
                }
            }
            ServerMessage::Error(err) => {
                if matches!(self.phase, Phase::AwaitingStart(_)) {
                    self.phase = Phase::Aborted;
                    self.failure = Some(err.message.clone());
                }
                step.emit(DriverEvent::ServerError(err.message));
            }
        }
        step
    }

    /// Handles a frame that failed to decode.
    ///
    /// A damaged `download_data` whose chunk id survived is still
    /// acknowledged, exactly once, so the server keeps sending.
    pub fn handle_malformed(&mut self, err: &CoreError) -> Step {
        let mut step = Step::default();

        if let CoreError::MalformedMessage {
            event,
            session_id: Some(session_id),
            chunk_id: Some(chunk_id),
            ..
        } = err
        {
            if event == "download_data"
                && self.phase == Phase::Downloading
                && self.is_current(session_id)
            {
                debug!(session_id = %session_id, chunk_id, "Acknowledging damaged chunk");
                step.send(Self::ack(session_id.clone(), *chunk_id));
                return step;
            }
        }

        debug!(error = %err, "Undecodable frame ignored");
        step
    }

    /// Fires the composite fallback if it is due.
    pub fn poll(&mut self, now: Instant) -> Step {
        let mut step = Step::default();
        if self.phase != Phase::Settling || self.fallback_sent {
            return step;
        }
        if self.fallback_at.is_some_and(|at| at <= now) {
            info!("Download leg did not start, requesting it");
            self.fallback_sent = true;
            self.fallback_at = None;
            self.phase = Phase::AwaitingStart(Direction::Download);
            step.send(ClientMessage::TestStart(TestStart::new(TestKind::Download)));
        }
        step
    }

    // ========================================
    // Queries
    // ========================================

    /// When [`poll`](Self::poll) next needs calling.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.phase == Phase::Settling && !self.fallback_sent {
            self.fallback_at
        } else {
            None
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns `true` once the test finished or was aborted.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.phase.is_done()
    }

    /// Figures collected so far.
    #[must_use]
    pub const fn report(&self) -> &TestReport {
        &self.report
    }

    /// Server message that aborted the test, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Session id of the running leg.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Upload chunk awaiting its ack.
    #[must_use]
    pub const fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Bytes moved in the running leg, as seen locally.
    #[must_use]
    pub const fn bytes_transferred(&self) -> u64 {
        self.bytes
    }

    /// Locally smoothed speed of the running leg, MB/s.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.estimator.current_speed()
    }

    // ========================================
    // Leg Handling
    // ========================================

    fn on_leg_start(&mut self, direction: Direction, session_id: SessionId, now: Instant, step: &mut Step) {
        let expected = match self.phase {
            Phase::AwaitingStart(d) => d == direction,
            Phase::Settling => direction == Direction::Download,
            _ => false,
        };
        if !expected {
            debug!(session_id = %session_id, direction = %direction, "Unexpected leg start ignored");
            return;
        }

        if self.phase == Phase::Settling
            && self.request.as_ref().is_some_and(|r| !r.same_request(&session_id))
        {
            debug!(session_id = %session_id, "Download leg from another request accepted");
        }

        self.reset_leg();
        self.fallback_at = None;
        self.request.get_or_insert_with(|| session_id.clone());
        self.session = Some(session_id.clone());
        self.last_sample_at = Some(now);

        info!(session_id = %session_id, direction = %direction, "Leg started");
        step.emit(DriverEvent::LegStarted {
            direction,
            session_id,
        });

        match direction {
            Direction::Upload => {
                self.phase = Phase::Uploading;
                self.buffer = Some(filler(self.config.chunk_size, FillMethod::Random));
                self.send_next_chunk(step);
            }
            Direction::Download => self.phase = Phase::Downloading,
        }
    }

    fn on_upload_ack(&mut self, ack: &ChunkAck, now: Instant, step: &mut Step) {
        if self.phase != Phase::Uploading || !self.is_current(&ack.session_id) {
            return;
        }
        if self.in_flight != Some(ack.chunk_id) {
            debug!(chunk_id = ack.chunk_id, expected = ?self.in_flight, "Stray upload ack ignored");
            return;
        }

        self.in_flight = None;
        let len = self.buffer.as_ref().map_or(0, |b| b.len() as u64);
        self.bytes += len;
        self.sample(Direction::Upload, len, now, step);
        self.send_next_chunk(step);
    }

    fn on_download_data(&mut self, chunk: &DataChunk, now: Instant, step: &mut Step) {
        if self.phase != Phase::Downloading || !self.is_current(&chunk.session_id) {
            debug!(session_id = %chunk.session_id, "Chunk for another session ignored");
            return;
        }

        let len = chunk.data.len() as u64;
        if len > 0 {
            self.bytes += len;
            self.sample(Direction::Download, len, now, step);
        }

        step.send(Self::ack(chunk.session_id.clone(), chunk.chunk_id));
    }

    fn on_result(&mut self, direction: Direction, result: SpeedSummary, now: Instant, step: &mut Step) {
        info!(
            direction = %direction,
            average = result.average_speed,
            max = result.max_speed,
            min = result.min_speed,
            "Leg finished"
        );

        self.report.record(direction, result);
        self.session = None;
        self.reset_leg();
        step.emit(DriverEvent::LegFinished { direction, result });

        let composite = self.kind.is_some_and(|k| k.is_composite());
        if composite && direction == Direction::Upload && self.report.download.is_none() {
            self.phase = Phase::Settling;
            self.fallback_at = Some(now + self.config.settle_delay * 2);
            return;
        }

        self.phase = Phase::Finished;
        self.report.elapsed = self
            .started_at
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        step.emit(DriverEvent::Complete(self.report.clone()));
    }

    // ========================================
    // Helpers
    // ========================================

    fn send_next_chunk(&mut self, step: &mut Step) {
        let (Some(session_id), Some(buffer)) = (&self.session, &self.buffer) else {
            return;
        };
        self.chunk_id += 1;
        self.in_flight = Some(self.chunk_id);
        step.send(ClientMessage::UploadData(DataChunk {
            session_id: session_id.clone(),
            chunk_id: self.chunk_id,
            data: buffer.clone(),
        }));
    }

    /// Sub-millisecond intervals carry their bytes into the next sample.
    fn sample(&mut self, direction: Direction, bytes: u64, now: Instant, step: &mut Step) {
        self.pending_bytes += bytes;
        let since = *self.last_sample_at.get_or_insert(now);
        let elapsed_ms = duration_millis(now.saturating_duration_since(since));
        if self.estimator.add_sample(self.pending_bytes, elapsed_ms) {
            self.last_sample_at = Some(now);
            self.pending_bytes = 0;
            step.emit(DriverEvent::SpeedUpdate {
                direction,
                speed: self.estimator.current_speed(),
            });
        }
    }

    fn ack(session_id: SessionId, chunk_id: u64) -> ClientMessage {
        ClientMessage::DownloadAck(ChunkAck {
            session_id,
            chunk_id,
            received_at: unix_millis(),
        })
    }

    fn is_current(&self, id: &SessionId) -> bool {
        self.session.as_ref() == Some(id)
    }

    fn reset_leg(&mut self) {
        self.buffer = None;
        self.chunk_id = 0;
        self.in_flight = None;
        self.last_sample_at = None;
        self.pending_bytes = 0;
        self.bytes = 0;
        self.estimator.reset();
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use lanspeed_core::protocol::{decode_server, ErrorMessage, Progress, TestResult};

    use super::*;

    fn driver() -> PeerDriver {
        PeerDriver::new(DriverConfig {
            chunk_size: 1024,
            window_size: 4,
            settle_delay: Duration::from_millis(1_000),
        })
        .unwrap()
    }

    fn sid(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    fn started(direction: Direction, id: &str) -> ServerMessage {
        ServerMessage::started(direction, sid(id))
    }

    fn summary(avg: f64) -> SpeedSummary {
        SpeedSummary {
            average_speed: avg,
            max_speed: avg,
            min_speed: avg,
            duration_ms: 10_000,
        }
    }

    fn result(direction: Direction, id: &str, avg: f64) -> ServerMessage {
        ServerMessage::TestResult(TestResult {
            session_id: sid(id),
            direction,
            result: summary(avg),
        })
    }

    fn upload_ack(id: &str, chunk_id: u64) -> ServerMessage {
        ServerMessage::UploadAck(ChunkAck {
            session_id: sid(id),
            chunk_id,
            received_at: 0,
        })
    }

    fn download_chunk(id: &str, chunk_id: u64, len: usize) -> ServerMessage {
        ServerMessage::DownloadData(DataChunk {
            session_id: sid(id),
            chunk_id,
            data: Bytes::from(vec![0u8; len]),
        })
    }

    fn sent_chunk_ids(step: &Step) -> Vec<u64> {
        step.outgoing
            .iter()
            .filter_map(|m| match m {
                ClientMessage::UploadData(c) => Some(c.chunk_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_request() {
        let mut d = driver();
        let msg = d.start(TestKind::Upload, Instant::now()).unwrap();
        assert_eq!(msg, ClientMessage::TestStart(TestStart::new(TestKind::Upload)));
        assert_eq!(d.phase(), Phase::AwaitingStart(Direction::Upload));
        assert!(matches!(
            d.start(TestKind::Download, Instant::now()),
            Err(ClientError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_upload_sends_one_chunk_per_ack() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Upload, t0).unwrap();

        let step = d.handle(started(Direction::Upload, "u1"), t0);
        assert_eq!(sent_chunk_ids(&step), vec![1]);
        assert_eq!(d.in_flight(), Some(1));

        // duplicate and foreign acks release nothing
        assert!(d.handle(upload_ack("u1", 7), t0).is_empty());
        assert!(d.handle(upload_ack("other", 1), t0).is_empty());

        let step = d.handle(upload_ack("u1", 1), t0 + Duration::from_millis(10));
        assert_eq!(sent_chunk_ids(&step), vec![2]);
        assert!(step
            .events
            .iter()
            .any(|e| matches!(e, DriverEvent::SpeedUpdate { direction: Direction::Upload, .. })));
        assert_eq!(d.bytes_transferred(), 1024);
    }

    #[test]
    fn test_upload_reuses_buffer() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Upload, t0).unwrap();
        let first = d.handle(started(Direction::Upload, "u1"), t0);
        let second = d.handle(upload_ack("u1", 1), t0 + Duration::from_millis(5));

        let data = |s: &Step| match &s.outgoing[0] {
            ClientMessage::UploadData(c) => c.data.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(data(&first), data(&second));
        assert_eq!(data(&first).len(), 1024);
    }

    #[test]
    fn test_zero_interval_ack_has_no_speed_update() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Upload, t0).unwrap();
        d.handle(started(Direction::Upload, "u1"), t0);
        let step = d.handle(upload_ack("u1", 1), t0);
        assert!(!step
            .events
            .iter()
            .any(|e| matches!(e, DriverEvent::SpeedUpdate { .. })));
        assert_eq!(sent_chunk_ids(&step), vec![2]);
    }

    #[test]
    fn test_download_acks_every_chunk() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Download, t0).unwrap();
        d.handle(started(Direction::Download, "d1"), t0);

        let step = d.handle(download_chunk("d1", 1, 2048), t0 + Duration::from_millis(2));
        assert_eq!(step.outgoing.len(), 1);
        match &step.outgoing[0] {
            ClientMessage::DownloadAck(ack) => {
                assert_eq!(ack.chunk_id, 1);
                assert_eq!(ack.session_id.as_str(), "d1");
            }
            other => panic!("unexpected {other:?}"),
        }

        // empty chunk still acked, no sample
        let step = d.handle(download_chunk("d1", 2, 0), t0 + Duration::from_millis(3));
        assert_eq!(step.outgoing.len(), 1);
        assert!(step.events.is_empty());

        // foreign session not acked
        assert!(d.handle(download_chunk("zz", 3, 10), t0).is_empty());
    }

    #[test]
    fn test_malformed_download_yields_exactly_one_ack() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Download, t0).unwrap();
        d.handle(started(Direction::Download, "d1"), t0);

        let err = decode_server(r#"{"event":"download_data","payload":{"sessionId":"d1","chunkId":5}}"#)
            .unwrap_err();
        let step = d.handle_malformed(&err);
        assert_eq!(step.outgoing.len(), 1);
        assert!(matches!(
            &step.outgoing[0],
            ClientMessage::DownloadAck(ack) if ack.chunk_id == 5
        ));

        // chunk id lost: nothing to ack
        let err = decode_server(r#"{"event":"download_data","payload":{"sessionId":"d1"}}"#)
            .unwrap_err();
        assert!(d.handle_malformed(&err).is_empty());
    }

    #[test]
    fn test_single_leg_completes() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Download, t0).unwrap();
        d.handle(started(Direction::Download, "d1"), t0);

        let progress = ServerMessage::TestProgress(Progress {
            session_id: sid("d1"),
            direction: Direction::Download,
            progress: 50.0,
            current_speed: 3.0,
            bytes_transferred: 10,
        });
        assert_eq!(d.handle(progress, t0).events.len(), 1);

        let step = d.handle(result(Direction::Download, "d1", 4.0), t0 + Duration::from_secs(10));
        assert!(d.is_finished());
        assert_eq!(step.events.len(), 2);
        match &step.events[1] {
            DriverEvent::Complete(report) => {
                assert_eq!(report.download, Some(summary(4.0)));
                assert_eq!(report.upload, None);
                assert_eq!(report.elapsed, Duration::from_secs(10));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_composite_follows_server_download() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Both, t0).unwrap();
        d.handle(started(Direction::Upload, "r1-upload"), t0);

        let t1 = t0 + Duration::from_secs(10);
        d.handle(result(Direction::Upload, "r1-upload", 5.0), t1);
        assert_eq!(d.phase(), Phase::Settling);
        assert_eq!(d.next_deadline(), Some(t1 + Duration::from_secs(2)));

        d.handle(started(Direction::Download, "r1-download"), t1 + Duration::from_secs(1));
        assert_eq!(d.phase(), Phase::Downloading);
        assert_eq!(d.next_deadline(), None);

        let step = d.handle(result(Direction::Download, "r1-download", 6.0), t1 + Duration::from_secs(11));
        assert!(d.is_finished());
        assert!(matches!(
            step.events.last(),
            Some(DriverEvent::Complete(r)) if r.upload.is_some() && r.download.is_some()
        ));
    }

    #[test]
    fn test_composite_fallback_requests_download() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Both, t0).unwrap();
        d.handle(started(Direction::Upload, "r1-upload"), t0);
        let t1 = t0 + Duration::from_secs(10);
        d.handle(result(Direction::Upload, "r1-upload", 5.0), t1);

        assert!(d.poll(t1 + Duration::from_secs(1)).is_empty());
        let step = d.poll(t1 + Duration::from_secs(2));
        assert_eq!(
            step.outgoing,
            vec![ClientMessage::TestStart(TestStart::new(TestKind::Download))]
        );
        assert_eq!(d.phase(), Phase::AwaitingStart(Direction::Download));
        assert!(d.poll(t1 + Duration::from_secs(5)).is_empty());

        d.handle(started(Direction::Download, "r2"), t1 + Duration::from_secs(3));
        assert_eq!(d.phase(), Phase::Downloading);
    }

    #[test]
    fn test_error_while_waiting_aborts() {
        let mut d = driver();
        d.start(TestKind::Upload, Instant::now()).unwrap();
        let step = d.handle(
            ServerMessage::Error(ErrorMessage::new("Session limit reached")),
            Instant::now(),
        );
        assert!(d.is_finished());
        assert_eq!(d.failure(), Some("Session limit reached"));
        assert!(matches!(step.events[0], DriverEvent::ServerError(_)));
    }

    #[test]
    fn test_cancel_stops_running_leg() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Upload, t0).unwrap();
        d.handle(started(Direction::Upload, "u1"), t0);

        assert_eq!(
            d.cancel(),
            Some(ClientMessage::TestStop(TestStop { session_id: sid("u1") }))
        );
        assert_eq!(d.phase(), Phase::Aborted);
        assert_eq!(d.cancel(), None);
        // late acks after cancel are ignored
        assert!(d.handle(upload_ack("u1", 1), t0).is_empty());
    }

    #[test]
    fn test_cancel_between_legs_stops_request() {
        let mut d = driver();
        let t0 = Instant::now();
        d.start(TestKind::Both, t0).unwrap();
        d.handle(started(Direction::Upload, "r1-upload"), t0);
        d.handle(result(Direction::Upload, "r1-upload", 5.0), t0 + Duration::from_secs(10));
        assert_eq!(d.phase(), Phase::Settling);
        assert_eq!(d.session(), None);

        assert_eq!(
            d.cancel(),
            Some(ClientMessage::TestStop(TestStop { session_id: sid("r1-upload") }))
        );
        assert_eq!(d.phase(), Phase::Aborted);
        assert_eq!(d.next_deadline(), None);

        // a download leg that was already on its way is not followed
        let step = d.handle(started(Direction::Download, "r1-download"), t0 + Duration::from_secs(11));
        assert!(step.is_empty());
        assert!(d.handle(download_chunk("r1-download", 1, 64), t0).is_empty());
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = DriverConfig {
            window_size: 0,
            ..DriverConfig::default()
        };
        assert!(PeerDriver::new(config).is_err());
    }
}
