//! Piece descriptors for the piece table.

use serde::{Deserialize, Serialize};

/// Which backing store a piece's bytes live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// The immutable source file, served through the origin cache
    Original,
    /// The append-only added store
    Added,
}

/// A contiguous run of bytes in one of the two backing stores.
///
/// A piece never owns text; it is a `(store, offset, size)` triple.
/// Zero-size pieces are legal and arise from splitting a piece exactly
/// at its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub origin: Origin,
    /// Byte offset into the backing store
    pub offset: usize,
    /// Number of bytes covered
    pub size: usize,
}

impl Piece {
    pub fn new(origin: Origin, offset: usize, size: usize) -> Self {
        Self { origin, offset, size }
    }

    /// One past the last store offset this piece covers.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}
