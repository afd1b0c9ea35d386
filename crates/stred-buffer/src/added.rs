//! Append-only store for inserted text.

use crate::{BufferError, BufferResult};

/// Holds every byte ever inserted into a buffer.
///
/// Text is only appended, never removed; deletion is expressed purely
/// in the piece table. Pieces refer into this store by offset, so the
/// offset of existing text never changes.
#[derive(Debug, Default)]
pub struct AddedStore {
    bytes: Vec<u8>,
}

impl AddedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes stored so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends `text` and returns the offset it was stored at.
    pub fn append(&mut self, text: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(text);
        offset
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> BufferResult<&[u8]> {
        self.bytes
            .get(offset..offset + len)
            .ok_or(BufferError::OutOfRange { pos: offset + len, size: self.bytes.len() })
    }
}
