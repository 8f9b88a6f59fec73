// ============================================
// File: crates/lanspeed-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! Millisecond conversions shared by both ends. Monotonic intervals
//! (`Duration`) feed the speed estimator; wall-clock Unix milliseconds
//! only appear in `receivedAt` acknowledgment fields.
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_millis)
        .unwrap_or_default()
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Builds a `Duration` from a millisecond config value.
#[must_use]
pub const fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
