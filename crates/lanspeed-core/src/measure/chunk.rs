// ============================================
// File: crates/lanspeed-core/src/measure/chunk.rs
// ============================================
//! # Chunk Generator
//!
//! ## Creation Reason
//! Produces the filler transferred during a test. Only the size of a
//! chunk matters, so a single buffer is filled once and handed out for
//! every chunk of the session.
//!
//! ## Main Functionality
//! - `FillMethod`: zero or random filler
//! - `ChunkGenerator`: bounded, single-cursor chunk source
//! - `filler()`: one-off buffer for the client's upload pump
//!
//! ## Cursor Model
//! ```text
//!  total_size = 2.5 × chunk_size
//!  ┌──────────────┬──────────────┬───────┐
//!  │   chunk 1    │   chunk 2    │ tail  │ → None
//!  └──────────────┴──────────────┴───────┘
//!  every chunk is a view into the same buffer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `next_chunk()` is O(1): it returns a `Bytes` view, never a copy
//! - Random fill costs O(chunk_size) once, at construction
//! - `reset()` rewinds the cursor only; the buffer is kept
//!
//! ## Last Modified
//! v0.1.0 - Initial chunk generator

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use lanspeed_common::error::CommonError;

use crate::error::{CoreError, Result};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1_048_576;

// ============================================
// FillMethod
// ============================================

/// How filler buffers are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// All zero bytes. Cheap, recommended default.
    #[default]
    Zero,
    /// Pseudo-random bytes, defeats link-level compression.
    Random,
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("zero"),
            Self::Random => f.write_str("random"),
        }
    }
}

impl FromStr for FillMethod {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "zero" => Ok(Self::Zero),
            "random" => Ok(Self::Random),
            other => Err(CommonError::unsupported("fill_method", other)),
        }
    }
}

/// Allocates a filler buffer of `size` bytes.
#[must_use]
pub fn filler(size: usize, method: FillMethod) -> Bytes {
    let mut buf = vec![0u8; size];
    if method == FillMethod::Random {
        rand::thread_rng().fill_bytes(&mut buf);
    }
    Bytes::from(buf)
}

// ============================================
// ChunkGenerator
// ============================================

/// Bounded source of filler chunks.
///
/// # Example
/// ```
/// use lanspeed_core::measure::{ChunkGenerator, FillMethod};
///
/// let mut gen = ChunkGenerator::new(2_500, 1_000, FillMethod::Zero).unwrap();
/// assert_eq!(gen.next_chunk().map(|c| c.len()), Some(1_000));
/// assert_eq!(gen.next_chunk().map(|c| c.len()), Some(1_000));
/// assert_eq!(gen.next_chunk().map(|c| c.len()), Some(500));
/// assert!(gen.next_chunk().is_none());
/// ```
pub struct ChunkGenerator {
    buffer: Bytes,
    total_size: u64,
    generated: u64,
    method: FillMethod,
}

impl ChunkGenerator {
    /// Creates a generator handing out `total_size` bytes in
    /// `chunk_size` pieces.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `chunk_size` is zero.
    pub fn new(total_size: u64, chunk_size: usize, method: FillMethod) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoreError::invalid_parameter(
                "chunk_size",
                "must be greater than 0",
            ));
        }

        Ok(Self {
            buffer: filler(chunk_size, method),
            total_size,
            generated: 0,
            method,
        })
    }

    /// Returns the next chunk, or `None` once `total_size` bytes were
    /// handed out.
    pub fn next_chunk(&mut self) -> Option<Bytes> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }

        let len = usize::try_from(remaining)
            .map_or(self.buffer.len(), |r| r.min(self.buffer.len()));
        self.generated += len as u64;

        if len == self.buffer.len() {
            Some(self.buffer.clone())
        } else {
            Some(self.buffer.slice(..len))
        }
    }

    /// Rewinds the cursor to the start.
    pub fn reset(&mut self) {
        self.generated = 0;
    }

    /// Bytes handed out so far.
    #[must_use]
    pub const fn bytes_generated(&self) -> u64 {
        self.generated
    }

    /// Bytes this generator will hand out in total.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes left before exhaustion.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.generated)
    }

    /// Returns `true` once every byte was handed out.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Size of a full chunk.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Fill method of the underlying buffer.
    #[must_use]
    pub const fn method(&self) -> FillMethod {
        self.method
    }
}

impl fmt::Debug for ChunkGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkGenerator")
            .field("chunk_size", &self.buffer.len())
            .field("method", &self.method)
            .field("generated", &self.generated)
            .field("total_size", &self.total_size)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
