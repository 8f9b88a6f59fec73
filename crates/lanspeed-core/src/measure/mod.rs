// ============================================
// File: crates/lanspeed-core/src/measure/mod.rs
// ============================================
//! # Measurement Module
//!
//! ## Submodules
//! - [`chunk`]: Filler chunk generation
//! - [`speed`]: Speed conversion, sliding-window estimator, summaries
//!
//! ## Last Modified
//! v0.1.0 - Initial measurement primitives

pub mod chunk;
pub mod speed;

pub use chunk::{filler, ChunkGenerator, FillMethod, DEFAULT_CHUNK_SIZE};
pub use speed::{
    calculate_speed, SpeedEstimator, SpeedSample, SpeedStats, SpeedSummary, BYTES_PER_MEGABYTE,
    DEFAULT_WINDOW_SIZE,
};
