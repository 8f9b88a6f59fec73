// ============================================
// File: crates/lanspeed-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! Every event of the throughput test as an explicit, typed variant,
//! so session logic never inspects loose JSON objects.
//!
//! ## Main Functionality
//! - `ClientMessage`: events a client sends
//! - `ServerMessage`: events a server sends
//! - Payload structs shared between both enums
//!
//! ## Envelope
//! ```text
//! {
//!   "event":   "download_ack",
//!   "payload": { "sessionId": "Zk3f..", "chunkId": 7, "receivedAt": 1718000000000 }
//! }
//! ```
//! Event names are snake_case, payload fields camelCase. Chunk bytes
//! travel as standard base64 in `data`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Renaming a variant or field changes the wire contract
//! - `test_start.direction` stays a plain string here; it is parsed
//!   by the receiver so an unsupported value becomes an `error` event
//!   instead of a decode failure
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use lanspeed_common::error::CommonError;
use lanspeed_common::{Direction, SessionId, TestKind};

use crate::measure::SpeedSummary;

// ============================================
// Event Names
// ============================================

/// Events accepted from a client.
pub const CLIENT_EVENTS: &[&str] = &["test_start", "test_stop", "upload_data", "download_ack"];

/// Events accepted from a server.
pub const SERVER_EVENTS: &[&str] = &[
    "upload_start",
    "upload_ack",
    "download_start",
    "download_data",
    "test_progress",
    "test_result",
    "error",
];

// ============================================
// Payloads
// ============================================

/// `test_start` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStart {
    /// Requested test: `upload`, `download` or `both`.
    pub direction: String,
}

impl TestStart {
    /// Creates a request for `kind`.
    #[must_use]
    pub fn new(kind: TestKind) -> Self {
        Self {
            direction: kind.as_str().to_string(),
        }
    }

    /// Parses the requested test kind.
    ///
    /// # Errors
    /// Returns `Unsupported` for anything but `upload`, `download`, `both`.
    pub fn kind(&self) -> std::result::Result<TestKind, CommonError> {
        self.direction.parse()
    }
}

/// `test_stop` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStop {
    /// Session to cancel.
    pub session_id: SessionId,
}

/// `upload_start` / `download_start` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    /// Id of the new session.
    pub session_id: SessionId,
}

/// `upload_data` / `download_data` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChunk {
    /// Owning session.
    pub session_id: SessionId,
    /// 1-based, increasing per session.
    pub chunk_id: u64,
    /// Chunk bytes.
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
}

/// `upload_ack` / `download_ack` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    /// Owning session.
    pub session_id: SessionId,
    /// Chunk being acknowledged.
    pub chunk_id: u64,
    /// Receiver's wall clock, Unix milliseconds.
    pub received_at: u64,
}

/// `test_progress` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Session being reported.
    pub session_id: SessionId,
    /// Leg direction.
    pub direction: Direction,
    /// Elapsed share of the test duration, 0 to 100.
    pub progress: f64,
    /// Smoothed speed in MB/s.
    pub current_speed: f64,
    /// Bytes moved so far.
    pub bytes_transferred: u64,
}

/// `test_result` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Finished session.
    pub session_id: SessionId,
    /// Leg direction.
    pub direction: Direction,
    /// Final statistics.
    pub result: SpeedSummary,
}

/// `error` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable reason.
    pub message: String,
}

impl ErrorMessage {
    /// Creates an error payload.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================
// ClientMessage
// ============================================

/// Event sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request a new test.
    TestStart(TestStart),
    /// Cancel a running session.
    TestStop(TestStop),
    /// One upload chunk.
    UploadData(DataChunk),
    /// Acknowledgment of one download chunk.
    DownloadAck(ChunkAck),
}

impl ClientMessage {
    /// Wire event name.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::TestStart(_) => "test_start",
            Self::TestStop(_) => "test_stop",
            Self::UploadData(_) => "upload_data",
            Self::DownloadAck(_) => "download_ack",
        }
    }

    /// Session this message refers to, if any.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::TestStart(_) => None,
            Self::TestStop(p) => Some(&p.session_id),
            Self::UploadData(p) => Some(&p.session_id),
            Self::DownloadAck(p) => Some(&p.session_id),
        }
    }
}

// ============================================
// ServerMessage
// ============================================

/// Event sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Upload session created.
    UploadStart(SessionStarted),
    /// Acknowledgment of one upload chunk.
    UploadAck(ChunkAck),
    /// Download session created.
    DownloadStart(SessionStarted),
    /// One download chunk.
    DownloadData(DataChunk),
    /// Periodic progress.
    TestProgress(Progress),
    /// Final statistics of one session.
    TestResult(TestResult),
    /// Request rejected.
    Error(ErrorMessage),
}

impl ServerMessage {
    /// Builds the start notification for `direction`.
    #[must_use]
    pub fn started(direction: Direction, session_id: SessionId) -> Self {
        let payload = SessionStarted { session_id };
        match direction {
            Direction::Upload => Self::UploadStart(payload),
            Direction::Download => Self::DownloadStart(payload),
        }
    }

    /// Builds an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMessage::new(message))
    }

    /// Wire event name.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::UploadStart(_) => "upload_start",
            Self::UploadAck(_) => "upload_ack",
            Self::DownloadStart(_) => "download_start",
            Self::DownloadData(_) => "download_data",
            Self::TestProgress(_) => "test_progress",
            Self::TestResult(_) => "test_result",
            Self::Error(_) => "error",
        }
    }

    /// Session this message refers to, if any.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::UploadStart(p) | Self::DownloadStart(p) => Some(&p.session_id),
            Self::UploadAck(p) => Some(&p.session_id),
            Self::DownloadData(p) => Some(&p.session_id),
            Self::TestProgress(p) => Some(&p.session_id),
            Self::TestResult(p) => Some(&p.session_id),
            Self::Error(_) => None,
        }
    }
}

// ============================================
// Base64 Field Encoding
// ============================================

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(|e| de::Error::custom(format!("invalid base64 data: {e}")))
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sid(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    #[test]
    fn test_client_envelope_shape() {
        let msg = ClientMessage::DownloadAck(ChunkAck {
            session_id: sid("abc"),
            chunk_id: 3,
            received_at: 42,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "download_ack",
                "payload": { "sessionId": "abc", "chunkId": 3, "receivedAt": 42 }
            })
        );
        assert_eq!(msg.event(), "download_ack");
    }

    #[test]
    fn test_data_is_base64() {
        let msg = ServerMessage::DownloadData(DataChunk {
            session_id: sid("abc"),
            chunk_id: 1,
            data: Bytes::from_static(&[0, 0, 0]),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["payload"]["data"], "AAAA");
    }

    #[test]
    fn test_result_payload_shape() {
        let msg = ServerMessage::TestResult(TestResult {
            session_id: sid("abc-upload"),
            direction: Direction::Upload,
            result: SpeedSummary {
                average_speed: 2.0,
                max_speed: 3.0,
                min_speed: 1.0,
                duration_ms: 10_000,
            },
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "test_result");
        assert_eq!(value["payload"]["direction"], "upload");
        assert_eq!(value["payload"]["result"]["minSpeed"], 1.0);
        assert_eq!(value["payload"]["result"]["durationMs"], 10_000);
    }

    #[test]
    fn test_test_start_kind() {
        assert_eq!(TestStart::new(TestKind::Both).kind().unwrap(), TestKind::Both);
        let bad = TestStart {
            direction: "sideways".into(),
        };
        assert!(bad.kind().is_err());
    }

    #[test]
    fn test_started_builder() {
        let msg = ServerMessage::started(Direction::Download, sid("x"));
        assert_eq!(msg.event(), "download_start");
        assert_eq!(msg.session_id().map(SessionId::as_str), Some("x"));
        assert!(ServerMessage::error("nope").session_id().is_none());
    }

    #[test]
    fn test_event_lists_match_variants() {
        let err = ServerMessage::error("x");
        assert!(SERVER_EVENTS.contains(&err.event()));
        let start = ClientMessage::TestStart(TestStart::new(TestKind::Upload));
        assert!(CLIENT_EVENTS.contains(&start.event()));
    }
}
