// ============================================
// File: crates/lanspeed-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Turns messages into JSON text frames and back, validating every
//! inbound frame before it reaches session logic.
//!
//! ## Parsing Strategy
//! 1. Parse the frame as a JSON object
//! 2. Read the `event` name and reject names outside this direction
//! 3. Deserialize the typed variant
//! 4. On payload failure, recover `sessionId`/`chunkId` so the caller
//!    can still act on a damaged chunk frame
//!
//! ## ⚠️ Important Note for Next Developer
//! - Decoding never panics on peer input
//! - Non-finite speeds serialize as `null`; keep estimator output finite
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use lanspeed_common::SessionId;

use crate::error::{CoreError, Result};
use crate::protocol::messages::{ClientMessage, ServerMessage, CLIENT_EVENTS, SERVER_EVENTS};

// ============================================
// Encoding
// ============================================

/// Encodes a client message as a text frame.
///
/// # Errors
/// Returns `Encode` if serialization fails.
pub fn encode_client(msg: &ClientMessage) -> Result<String> {
    encode(msg.event(), msg)
}

/// Encodes a server message as a text frame.
///
/// # Errors
/// Returns `Encode` if serialization fails.
pub fn encode_server(msg: &ServerMessage) -> Result<String> {
    encode(msg.event(), msg)
}

fn encode<T: Serialize>(event: &str, msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| CoreError::Encode {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

// ============================================
// Decoding
// ============================================

/// Decodes a frame received by the server.
///
/// # Errors
/// - `InvalidFrame` if the text is not an event envelope
/// - `UnknownEvent` if the event is not a client event
/// - `MalformedMessage` if the payload does not match the event
///
/// # Example
/// ```
/// use lanspeed_core::protocol::codec::decode_client;
/// use lanspeed_core::ClientMessage;
///
/// let msg = decode_client(r#"{"event":"test_start","payload":{"direction":"upload"}}"#).unwrap();
/// assert!(matches!(msg, ClientMessage::TestStart(_)));
/// ```
pub fn decode_client(text: &str) -> Result<ClientMessage> {
    decode(text, CLIENT_EVENTS)
}

/// Decodes a frame received by a client.
///
/// # Errors
/// Same as [`decode_client`], against the server event set.
pub fn decode_server(text: &str) -> Result<ServerMessage> {
    decode(text, SERVER_EVENTS)
}

fn decode<T: DeserializeOwned>(text: &str, known: &[&str]) -> Result<T> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CoreError::invalid_frame(format!("not JSON: {e}")))?;

    let event = value
        .as_object()
        .ok_or_else(|| CoreError::invalid_frame("expected a JSON object"))?
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::invalid_frame("missing 'event' name"))?
        .to_string();

    if !known.contains(&event.as_str()) {
        return Err(CoreError::UnknownEvent(event));
    }

    let payload = value.get("payload").cloned();
    serde_json::from_value(value).map_err(|e| CoreError::MalformedMessage {
        reason: e.to_string(),
        session_id: payload.as_ref().and_then(recover_session_id),
        chunk_id: payload.as_ref().and_then(recover_chunk_id),
        event,
    })
}

fn recover_session_id(payload: &Value) -> Option<SessionId> {
    payload
        .get("sessionId")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn recover_chunk_id(payload: &Value) -> Option<u64> {
    payload.get("chunkId").and_then(Value::as_u64)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{ChunkAck, DataChunk, TestStart};
    use bytes::Bytes;
    use lanspeed_common::TestKind;

    #[test]
    fn test_client_frame_round_trip() {
        let msg = ClientMessage::UploadData(DataChunk {
            session_id: "s1".parse().unwrap(),
            chunk_id: 9,
            data: Bytes::from_static(b"hello"),
        });
        let text = encode_client(&msg).unwrap();
        assert_eq!(decode_client(&text).unwrap(), msg);
    }

    #[test]
    fn test_not_json() {
        let err = decode_client("upload please").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame { .. }));
    }

    #[test]
    fn test_missing_event_name() {
        let err = decode_client(r#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame { .. }));
        let err = decode_client("[1,2]").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFrame { .. }));
    }

    #[test]
    fn test_wrong_direction_event_is_unknown() {
        let err = decode_client(r#"{"event":"upload_ack","payload":{}}"#).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEvent(ref e) if e == "upload_ack"));
        let err = decode_server(r#"{"event":"test_start","payload":{}}"#).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEvent(_)));
    }

    #[test]
    fn test_missing_data_recovers_chunk_id() {
        let err = decode_server(
            r#"{"event":"download_data","payload":{"sessionId":"abc","chunkId":4}}"#,
        )
        .unwrap_err();
        assert_eq!(err.recovered_chunk_id(), Some(4));
        assert_eq!(err.event(), Some("download_data"));
        match err {
            CoreError::MalformedMessage { session_id, .. } => {
                assert_eq!(session_id.unwrap().as_str(), "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_base64_recovers_chunk_id() {
        let err = decode_server(
            r#"{"event":"download_data","payload":{"sessionId":"abc","chunkId":2,"data":"@@@"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.recovered_chunk_id(), Some(2));
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let err = decode_server(r#"{"event":"download_data"}"#).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedMessage { chunk_id: None, .. }
        ));
    }

    #[test]
    fn test_unknown_direction_still_decodes() {
        let msg =
            decode_client(r#"{"event":"test_start","payload":{"direction":"sideways"}}"#).unwrap();
        match msg {
            ClientMessage::TestStart(start) => assert!(start.kind().is_err()),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_server_ack_decodes() {
        let text = r#"{"event":"upload_ack","payload":{"sessionId":"u1","chunkId":1,"receivedAt":5}}"#;
        let msg = decode_server(text).unwrap();
        assert_eq!(
            msg,
            ServerMessage::UploadAck(ChunkAck {
                session_id: "u1".parse().unwrap(),
                chunk_id: 1,
                received_at: 5,
            })
        );
    }

    #[test]
    fn test_encode_start() {
        let text =
            encode_client(&ClientMessage::TestStart(TestStart::new(TestKind::Download))).unwrap();
        assert_eq!(
            text,
            r#"{"event":"test_start","payload":{"direction":"download"}}"#
        );
    }
}
