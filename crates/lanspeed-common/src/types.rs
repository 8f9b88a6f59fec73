// ============================================
// File: crates/lanspeed-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identifiers and enums that appear on the wire so
//! that the server and the client driver agree on their spelling.
//!
//! ## Main Functionality
//! - `SessionId`: Opaque identifier of one directional measurement
//! - `Direction`: Upload or download
//! - `TestKind`: What a peer asks for (`upload`, `download`, `both`)
//!
//! ## Composite Correlation
//! ```text
//!   request id:   Zk3f9aQ1xR0bTg
//!   upload leg:   Zk3f9aQ1xR0bTg-upload
//!   download leg: Zk3f9aQ1xR0bTg-download
//! ```
//! Both legs of a "both" test share the request id prefix; single tests
//! use the bare request id.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `SessionId` is peer-visible, keep it URL and JSON safe
//! - Maintain the lowercase wire spelling of the enums
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Number of random bytes behind a generated id.
pub const SESSION_ID_ENTROPY: usize = 12;

/// Maximum accepted length of a peer-supplied id.
pub const MAX_SESSION_ID_LEN: usize = 128;

// ============================================
// Direction
// ============================================

/// Direction of one measurement, seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Client sends, server acknowledges.
    Upload,
    /// Server sends, client acknowledges.
    Download,
}

impl Direction {
    /// Wire spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            other => Err(CommonError::unsupported("direction", other)),
        }
    }
}

// ============================================
// TestKind
// ============================================

/// Test type requested by a peer in `test_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Upload only.
    Upload,
    /// Download only.
    Download,
    /// Upload followed by download.
    Both,
}

impl TestKind {
    /// Directions this test runs, in order.
    #[must_use]
    pub const fn legs(&self) -> &'static [Direction] {
        match self {
            Self::Upload => &[Direction::Upload],
            Self::Download => &[Direction::Download],
            Self::Both => &[Direction::Upload, Direction::Download],
        }
    }

    /// Returns `true` for the chained upload-then-download test.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Both)
    }

    /// Wire spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Both => "both",
        }
    }
}

impl From<Direction> for TestKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Upload => Self::Upload,
            Direction::Download => Self::Download,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            "both" => Ok(Self::Both),
            other => Err(CommonError::unsupported("direction", other)),
        }
    }
}

// ============================================
// SessionId
// ============================================

/// Opaque identifier of one directional measurement.
///
/// # Example
/// ```
/// use lanspeed_common::types::{Direction, SessionId};
///
/// let request = SessionId::generate();
/// let upload = request.leg(Direction::Upload);
///
/// assert_eq!(upload.request_id(), request.as_str());
/// assert_eq!(upload.leg_direction(), Some(Direction::Upload));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new random id.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_ENTROPY];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(BASE64.encode(bytes))
    }

    /// Id of one leg of a composite request.
    #[must_use]
    pub fn leg(&self, direction: Direction) -> Self {
        Self(format!("{}-{}", self.0, direction))
    }

    /// The logical request this id belongs to.
    ///
    /// For composite legs this strips the `-upload`/`-download` suffix;
    /// for single tests it is the id itself.
    #[must_use]
    pub fn request_id(&self) -> &str {
        for direction in [Direction::Upload, Direction::Download] {
            if let Some(prefix) = self
                .0
                .strip_suffix(direction.as_str())
                .and_then(|rest| rest.strip_suffix('-'))
            {
                if !prefix.is_empty() {
                    return prefix;
                }
            }
        }
        &self.0
    }

    /// Direction encoded in a composite leg id, if any.
    #[must_use]
    pub fn leg_direction(&self) -> Option<Direction> {
        if self.request_id().len() == self.0.len() {
            return None;
        }
        [Direction::Upload, Direction::Download]
            .into_iter()
            .find(|d| self.0.ends_with(d.as_str()))
    }

    /// Returns `true` if both ids belong to the same logical request.
    #[must_use]
    pub fn same_request(&self, other: &Self) -> bool {
        self.request_id() == other.request_id()
    }

    /// Borrowed string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl TryFrom<String> for SessionId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(CommonError::invalid_input("sessionId", "cannot be empty"));
        }
        if value.len() > MAX_SESSION_ID_LEN {
            return Err(CommonError::invalid_input(
                "sessionId",
                format!("cannot exceed {MAX_SESSION_ID_LEN} characters"),
            ));
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CommonError::invalid_input(
                "sessionId",
                "cannot contain whitespace or control characters",
            ));
        }
        Ok(Self(value))
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.request_id(), a.as_str());
        assert_eq!(a.leg_direction(), None);
    }

    #[test]
    fn test_leg_correlation() {
        let request = SessionId::generate();
        let upload = request.leg(Direction::Upload);
        let download = request.leg(Direction::Download);

        assert!(upload.same_request(&download));
        assert!(upload.same_request(&request));
        assert_eq!(download.leg_direction(), Some(Direction::Download));
        assert!(!upload.same_request(&SessionId::generate()));
    }

    #[test]
    fn test_bare_suffix_is_not_a_leg() {
        let id: SessionId = "upload".parse().unwrap();
        assert_eq!(id.request_id(), "upload");
        assert_eq!(id.leg_direction(), None);
    }

    #[test]
    fn test_session_id_validation() {
        assert!("".parse::<SessionId>().is_err());
        assert!("has space".parse::<SessionId>().is_err());
        assert!("a".repeat(MAX_SESSION_ID_LEN + 1).parse::<SessionId>().is_err());
        assert!("abc-upload".parse::<SessionId>().is_ok());
    }

    #[test]
    fn test_session_id_serde() {
        let id: SessionId = "abc".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("upload".parse::<Direction>().unwrap(), Direction::Upload);
        assert!("both".parse::<Direction>().is_err());
        assert_eq!("both".parse::<TestKind>().unwrap(), TestKind::Both);
        assert!(matches!(
            "sideways".parse::<TestKind>(),
            Err(CommonError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_kind_legs() {
        assert_eq!(TestKind::Both.legs(), &[Direction::Upload, Direction::Download]);
        assert_eq!(TestKind::from(Direction::Download).legs(), &[Direction::Download]);
        assert!(TestKind::Both.is_composite());
    }
}
