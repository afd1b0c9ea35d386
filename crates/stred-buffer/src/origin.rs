//! Windowed cache over the immutable source.
//!
//! The source file is never loaded whole. A single block-sized window
//! is kept in memory and refilled on demand; reads that cross the
//! window simply refill it as they go.

use std::io::{Read, Seek, SeekFrom};

use crate::{BufferError, BufferResult};

/// Size of the cache window in bytes.
pub const BLOCK_SIZE: usize = 1 << 17;

/// Windows are aligned to half-block boundaries so that a read near a
/// boundary still has half a block of context on either side.
const HALF_BLOCK: usize = BLOCK_SIZE / 2;

/// Anything the origin cache can page from.
pub trait Source: Read + Seek {}

impl<T: Read + Seek> Source for T {}

/// Read-only view of the original file with a single cached window.
pub struct OriginCache {
    source: Box<dyn Source>,
    len: usize,
    window: Vec<u8>,
    base: usize,
    primed: bool,
}

impl std::fmt::Debug for OriginCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginCache")
            .field("len", &self.len)
            .field("base", &self.base)
            .field("window_len", &self.window.len())
            .finish()
    }
}

impl OriginCache {
    /// Wraps a seekable source, measuring its length up front.
    pub fn new(mut source: impl Source + 'static) -> BufferResult<Self> {
        let len = source.seek(SeekFrom::End(0))? as usize;
        Ok(Self {
            source: Box::new(source),
            len,
            window: Vec::new(),
            base: 0,
            primed: false,
        })
    }

    /// Length of the underlying source in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Window placement for a given offset: the nearest half-block
    /// boundary that leaves the offset roughly centered, clamped to
    /// the start of the file for small offsets.
    fn window_base(offset: usize) -> usize {
        if offset < HALF_BLOCK {
            0
        } else {
            ((offset + BLOCK_SIZE / 4) & !(HALF_BLOCK - 1)) - HALF_BLOCK
        }
    }

    fn ensure_window(&mut self, offset: usize) -> BufferResult<()> {
        let base = Self::window_base(offset);
        if self.primed && self.base == base {
            return Ok(());
        }
        tracing::trace!(base, "refilling origin cache window");
        self.source.seek(SeekFrom::Start(base as u64))?;
        self.window.resize(BLOCK_SIZE, 0);
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.source.read(&mut self.window[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.window.truncate(filled);
        self.base = base;
        self.primed = true;
        Ok(())
    }

    /// Copies `len` bytes starting at `offset` into `out`, refilling
    /// the window as many times as the read requires.
    pub fn read(&mut self, mut offset: usize, mut len: usize, out: &mut Vec<u8>) -> BufferResult<()> {
        if offset + len > self.len {
            return Err(BufferError::OutOfRange { pos: offset + len, size: self.len });
        }
        while len > 0 {
            self.ensure_window(offset)?;
            let start = offset - self.base;
            if start >= self.window.len() {
                // the source shrank underneath us
                return Err(BufferError::OutOfRange { pos: offset, size: self.base + self.window.len() });
            }
            let take = len.min(self.window.len() - start);
            out.extend_from_slice(&self.window[start..start + take]);
            offset += take;
            len -= take;
        }
        Ok(())
    }
}
