//! # Stred Buffer
//!
//! Piece-table text buffer over an immutable source file.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     TextBuffer                        │
//! │  ┌────────────┐ ┌─────────────┐ ┌─────────────────┐  │
//! │  │ PieceTable │ │ OriginCache │ │   AddedStore    │  │
//! │  └────────────┘ └─────────────┘ └─────────────────┘  │
//! │        │               │                 │           │
//! │     pieces          source file     inserted text    │
//! │                    (immutable)     (append-only)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The document is never held in memory as a whole: the piece table is
//! an ordered sequence of spans into the two backing stores, and every
//! edit splices, splits, or extends pieces instead of rewriting text.
//!
//! ## Learning: Ownership in Action
//!
//! The table exclusively owns all pieces; a [`PieceIter`] is a small
//! generation-checked handle, not a reference, so mutating the table
//! never invalidates handles to unrelated pieces.

mod added;
mod buffer;
mod origin;
mod piece;
mod scanner;
mod tree;

pub use added::AddedStore;
pub use buffer::TextBuffer;
pub use origin::{OriginCache, Source, BLOCK_SIZE};
pub use piece::{Origin, Piece};
pub use scanner::{Matcher, Scanner, DEFAULT_CHUNK_SIZE};
pub use tree::{PieceIter, PieceTable, Side};

use serde::{Deserialize, Serialize};

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("position {pos} is out of range for buffer of size {size}")]
    OutOfRange { pos: usize, size: usize },

    #[error("trying to delete beyond end of buffer")]
    BeyondBuffer,

    #[error("iterator no longer points into the piece table")]
    StaleIterator,

    #[error("scan start {start} is beyond scan end {end}")]
    InvalidScanRange { start: usize, end: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A half-open byte range `[start, end)` within a buffer.
///
/// The same shape serves selections, match results, and resolved
/// addresses. Empty spans (`start == end`) are ordinary values; they
/// describe a position between two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span. `start` must not exceed `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} beyond end {end}");
        Self { start, end }
    }

    /// Creates a zero-width span at `pos`.
    pub fn at(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    /// Returns the number of bytes the span covers.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for a zero-width span.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<usize> for Span {
    fn from(pos: usize) -> Self {
        Self::at(pos)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}
