// ============================================
// File: crates/lanspeed-core/src/measure/speed.rs
// ============================================
//! # Speed Calculation
//!
//! ## Creation Reason
//! Per-chunk timings are bursty. Live displays need a smoothed figure,
//! while the final result needs max/min/average over the whole session.
//! Both are computed here from plain (bytes, milliseconds) samples.
//!
//! ## Main Functionality
//! - `calculate_speed()`: bytes over milliseconds → MB/s
//! - `SpeedEstimator`: fixed-capacity sliding window with running sums
//! - `SpeedStats`: max/min of instantaneous speeds plus the final summary
//! - `SpeedSummary`: the `result` object of a `test_result` event
//!
//! ## Sliding Window
//! ```text
//!  window_size = 4
//!  ┌────┬────┬────┬────┐
//!  │ s2 │ s3 │ s4 │ s5 │ ◄── add s6: evict s2, sums -= s2, sums += s6
//!  └────┴────┴────┴────┘
//!  speed = Σbytes / Σelapsed_ms × 1000 / 1 MiB
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Zero-length intervals are rejected before they reach a division
//! - One "MB" is 1,048,576 bytes throughout the protocol
//!
//! ## Last Modified
//! v0.1.0 - Initial speed calculation

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Bytes in one binary megabyte.
pub const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// Default number of samples in the sliding window.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Converts a transfer of `bytes` over `elapsed_ms` into MB/s.
///
/// Returns 0 when `elapsed_ms` is 0.
///
/// # Example
/// ```
/// use lanspeed_core::measure::calculate_speed;
///
/// assert_eq!(calculate_speed(1_048_576, 1_000), 1.0);
/// assert_eq!(calculate_speed(1_048_576, 0), 0.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_speed(bytes: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    (bytes as f64 / BYTES_PER_MEGABYTE) / (elapsed_ms as f64 / 1_000.0)
}

// ============================================
// SpeedSample
// ============================================

/// One (bytes, elapsed) observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSample {
    /// Bytes moved in the interval.
    pub bytes: u64,
    /// Interval length in milliseconds.
    pub elapsed_ms: u64,
}

impl SpeedSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(bytes: u64, elapsed_ms: u64) -> Self {
        Self { bytes, elapsed_ms }
    }

    /// A sample with a zero interval carries no rate information.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.elapsed_ms > 0
    }

    /// Speed of this sample alone.
    #[must_use]
    pub fn speed(&self) -> f64 {
        calculate_speed(self.bytes, self.elapsed_ms)
    }
}

// ============================================
// SpeedEstimator
// ============================================

/// Sliding-window speed estimator.
///
/// Keeps the last `window_size` valid samples and running sums of
/// their bytes and durations, so both updates and reads are O(1).
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    samples: VecDeque<SpeedSample>,
    window_size: usize,
    total_bytes: u64,
    total_elapsed_ms: u64,
}

impl SpeedEstimator {
    /// Creates an estimator holding at most `window_size` samples.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `window_size` is zero.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(CoreError::invalid_parameter(
                "window_size",
                "must be greater than 0",
            ));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(window_size + 1),
            window_size,
            total_bytes: 0,
            total_elapsed_ms: 0,
        })
    }

    /// Adds a sample, evicting the oldest once the window is full.
    ///
    /// Returns `false` and leaves the window untouched when
    /// `elapsed_ms` is zero.
    pub fn add_sample(&mut self, bytes: u64, elapsed_ms: u64) -> bool {
        let sample = SpeedSample::new(bytes, elapsed_ms);
        if !sample.is_valid() {
            return false;
        }

        self.samples.push_back(sample);
        self.total_bytes += bytes;
        self.total_elapsed_ms += elapsed_ms;

        if self.samples.len() > self.window_size {
            if let Some(oldest) = self.samples.pop_front() {
                self.total_bytes -= oldest.bytes;
                self.total_elapsed_ms -= oldest.elapsed_ms;
            }
        }
        true
    }

    /// Smoothed speed over the window in MB/s, 0 if empty.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        calculate_speed(self.total_bytes, self.total_elapsed_ms)
    }

    /// Clears all samples.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.total_bytes = 0;
        self.total_elapsed_ms = 0;
    }

    /// Number of samples currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the window holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window capacity.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// (bytes, elapsed_ms) sums over the window.
    #[must_use]
    pub const fn totals(&self) -> (u64, u64) {
        (self.total_bytes, self.total_elapsed_ms)
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(DEFAULT_WINDOW_SIZE + 1),
            window_size: DEFAULT_WINDOW_SIZE,
            total_bytes: 0,
            total_elapsed_ms: 0,
        }
    }
}

// ============================================
// SpeedSummary
// ============================================

/// Final statistics of one session, in MB/s and milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedSummary {
    /// Total bytes over total duration.
    pub average_speed: f64,
    /// Fastest observed rate.
    pub max_speed: f64,
    /// Slowest observed rate, 0 when nothing was sampled.
    pub min_speed: f64,
    /// Session length from start to end.
    pub duration_ms: u64,
}

// ============================================
// SpeedStats
// ============================================

/// Running max/min of per-sample speeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedStats {
    max: f64,
    min: Option<f64>,
    samples: u64,
}

impl SpeedStats {
    /// Creates empty stats.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max: 0.0,
            min: None,
            samples: 0,
        }
    }

    /// Records the speed of one valid sample.
    pub fn record(&mut self, speed: f64) {
        if !speed.is_finite() {
            return;
        }
        self.max = self.max.max(speed);
        self.min = Some(self.min.map_or(speed, |m| m.min(speed)));
        self.samples += 1;
    }

    /// Number of recorded samples.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Highest recorded speed.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Lowest recorded speed, `None` if nothing was recorded.
    #[must_use]
    pub const fn min(&self) -> Option<f64> {
        self.min
    }

    /// Builds the final summary for `total_bytes` over `duration_ms`.
    ///
    /// The average always lies inside `[min, max]`: the envelope is
    /// widened to include it, since per-sample intervals never cover
    /// the time before the first sample or after the last one. With no
    /// samples the minimum is 0.
    #[must_use]
    pub fn summarize(&self, total_bytes: u64, duration_ms: u64) -> SpeedSummary {
        let average_speed = calculate_speed(total_bytes, duration_ms);
        let min_speed = self.min.map_or(0.0, |m| m.min(average_speed));
        SpeedSummary {
            average_speed,
            max_speed: self.max.max(average_speed),
            min_speed,
            duration_ms,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1_048_576;

    #[test]
    fn test_calculate_speed_unit() {
        assert!((calculate_speed(MIB, 1_000) - 1.0).abs() < f64::EPSILON);
        assert!((calculate_speed(10 * MIB, 2_000) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_speed_zero_elapsed() {
        assert_eq!(calculate_speed(12_345, 0), 0.0);
        assert_eq!(calculate_speed(0, 0), 0.0);
    }

    #[test]
    fn test_window_eviction_keeps_sums_consistent() {
        let mut est = SpeedEstimator::new(10).unwrap();
        for _ in 0..11 {
            assert!(est.add_sample(MIB, 1_000));
        }
        assert_eq!(est.len(), 10);
        assert_eq!(est.totals(), (10 * MIB, 10_000));
        assert!((est.current_speed() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut est = SpeedEstimator::new(2).unwrap();
        est.add_sample(100 * MIB, 1_000);
        est.add_sample(MIB, 1_000);
        est.add_sample(MIB, 1_000);
        assert!((est.current_speed() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_interval_discarded() {
        let mut est = SpeedEstimator::default();
        assert!(!est.add_sample(MIB, 0));
        assert!(est.is_empty());
        assert_eq!(est.current_speed(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut est = SpeedEstimator::default();
        est.add_sample(MIB, 500);
        est.reset();
        assert!(est.is_empty());
        assert_eq!(est.totals(), (0, 0));
        assert_eq!(est.window_size(), DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(SpeedEstimator::new(0).is_err());
    }

    #[test]
    fn test_summary_without_samples() {
        let stats = SpeedStats::new();
        let summary = stats.summarize(0, 15_000);
        assert_eq!(summary.min_speed, 0.0);
        assert_eq!(summary.max_speed, 0.0);
        assert_eq!(summary.average_speed, 0.0);
        assert_eq!(summary.duration_ms, 15_000);
    }

    #[test]
    fn test_summary_ordering() {
        let mut stats = SpeedStats::new();
        for (bytes, ms) in [(MIB, 100), (MIB, 50), (MIB, 400)] {
            stats.record(calculate_speed(bytes, ms));
        }
        let summary = stats.summarize(3 * MIB, 550);
        assert!(summary.min_speed <= summary.average_speed);
        assert!(summary.average_speed <= summary.max_speed);
        assert_eq!(stats.samples(), 3);
    }

    #[test]
    fn test_summary_widens_envelope_for_idle_tail() {
        let mut stats = SpeedStats::new();
        stats.record(calculate_speed(MIB, 10));
        // one chunk, then the peer went quiet until the watchdog
        let summary = stats.summarize(MIB, 15_000);
        assert!(summary.min_speed <= summary.average_speed);
        assert!(summary.average_speed <= summary.max_speed);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = SpeedSummary {
            average_speed: 1.0,
            max_speed: 2.0,
            min_speed: 0.5,
            duration_ms: 10,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["averageSpeed"], 1.0);
        assert_eq!(json["durationMs"], 10);
    }
}
