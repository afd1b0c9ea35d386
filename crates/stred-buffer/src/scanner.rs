//! Chunked forward scanning over a buffer region.

use crate::buffer::TextBuffer;
use crate::{BufferResult, Span};

/// Default number of bytes served per [`Scanner::read`] call.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Something that can find a match in scanner-delivered text.
///
/// Implementations pull chunks via [`Scanner::read`] and report spans
/// in scanner-local coordinates (relative to the scanner position at
/// the start of the search). Span 0 is the whole match; further spans
/// are capture groups.
pub trait Matcher {
    fn find(&self, scanner: &mut Scanner<'_>) -> BufferResult<Option<Vec<Span>>>;
}

struct Cached {
    start: usize,
    bytes: Vec<u8>,
}

/// A movable read position over `[pos, end)` of a buffer.
///
/// The most recently read chunk is cached, so a search that restarts
/// just past a previous match is usually served without touching the
/// buffer again.
pub struct Scanner<'a> {
    buffer: &'a mut TextBuffer,
    pos: usize,
    end_pos: Option<usize>,
    chunk_size: usize,
    cache: Option<Cached>,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(buffer: &'a mut TextBuffer, pos: usize, end_pos: Option<usize>) -> Self {
        Self { buffer, pos, end_pos, chunk_size: DEFAULT_CHUNK_SIZE, cache: None }
    }

    /// Overrides the chunk size. Mostly useful to exercise chunk
    /// boundaries, or to tune scanning over huge files.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Current scan position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the scan position.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Exclusive end of the scanned region, clamped to the buffer.
    pub fn limit(&self) -> usize {
        let size = self.buffer.size();
        self.end_pos.map_or(size, |end| end.min(size))
    }

    /// Returns the next chunk and advances past it, or `None` when the
    /// region is exhausted. Chunks are at most `chunk_size` bytes; a
    /// cached chunk may be served in one piece regardless.
    pub fn read(&mut self) -> BufferResult<Option<Vec<u8>>> {
        let limit = self.limit();
        if self.pos >= limit {
            return Ok(None);
        }
        if let Some(cached) = &self.cache
            && self.pos >= cached.start
            && self.pos < cached.start + cached.bytes.len()
        {
            let available = &cached.bytes[self.pos - cached.start..];
            let take = available.len().min(limit - self.pos);
            let chunk = available[..take].to_vec();
            self.pos += take;
            return Ok(Some(chunk));
        }
        let len = self.chunk_size.min(limit - self.pos);
        let chunk = self.buffer.read(self.pos, Some(len))?;
        self.cache = Some(Cached { start: self.pos, bytes: chunk.clone() });
        self.pos += len;
        Ok(Some(chunk))
    }

    /// Runs `matcher` from the current position and translates its
    /// spans into buffer coordinates. On a match the position advances
    /// to the end of the whole match; a zero-length match leaves it in
    /// place, and the caller decides how to make progress.
    pub fn search<M: Matcher + ?Sized>(&mut self, matcher: &M) -> BufferResult<Option<Vec<Span>>> {
        // past the region nothing can match, not even an empty
        // pattern; at the limit an empty pattern still can
        if self.pos > self.limit() {
            return Ok(None);
        }
        let base = self.pos;
        let Some(spans) = matcher.find(self)? else {
            return Ok(None);
        };
        debug_assert!(!spans.is_empty(), "matcher reported a match without span 0");
        let spans: Vec<Span> = spans
            .iter()
            .map(|s| Span::new(s.start + base, s.end + base))
            .collect();
        self.pos = spans.first().map_or(base, |whole| whole.end);
        Ok(Some(spans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds the first occurrence of a literal byte string.
    struct Literal(&'static [u8]);

    impl Matcher for Literal {
        fn find(&self, scanner: &mut Scanner<'_>) -> BufferResult<Option<Vec<Span>>> {
            let mut haystack = Vec::new();
            while let Some(chunk) = scanner.read()? {
                haystack.extend_from_slice(&chunk);
            }
            Ok(haystack
                .windows(self.0.len().max(1))
                .position(|w| w == self.0)
                .map(|start| vec![Span::new(start, start + self.0.len())]))
        }
    }

    fn buffer(text: &str) -> TextBuffer {
        TextBuffer::from_text(text).unwrap()
    }

    #[test]
    fn test_read_chunks_whole_region() {
        let mut buf = buffer("abcdefgh");
        let mut scanner = buf.scanner(1, Some(7)).unwrap().with_chunk_size(3);
        assert_eq!(scanner.read().unwrap().unwrap(), b"bcd");
        assert_eq!(scanner.read().unwrap().unwrap(), b"efg");
        assert_eq!(scanner.read().unwrap(), None);
    }

    #[test]
    fn test_read_clamps_to_buffer_size() {
        let mut buf = buffer("abc");
        let mut scanner = buf.scanner(0, Some(100)).unwrap();
        assert_eq!(scanner.read().unwrap().unwrap(), b"abc");
        assert_eq!(scanner.read().unwrap(), None);
    }

    #[test]
    fn test_cached_chunk_served_after_set_pos() {
        let mut buf = buffer("abcdefgh");
        let mut scanner = buf.scanner(0, None).unwrap();
        assert_eq!(scanner.read().unwrap().unwrap(), b"abcdefgh");
        scanner.set_pos(2);
        // comes out of the cache, not the buffer
        assert_eq!(scanner.read().unwrap().unwrap(), b"cdefgh");
    }

    #[test]
    fn test_search_translates_and_advances() {
        let mut buf = buffer("xxneedlexx");
        let mut scanner = buf.scanner(0, None).unwrap();
        let spans = scanner.search(&Literal(b"needle")).unwrap().unwrap();
        assert_eq!(spans, vec![Span::new(2, 8)]);
        assert_eq!(scanner.pos(), 8);
        assert_eq!(scanner.search(&Literal(b"needle")).unwrap(), None);
    }

    #[test]
    fn test_search_repeated_matches() {
        let mut buf = buffer("aXbXc");
        let mut scanner = buf.scanner(0, None).unwrap();
        let first = scanner.search(&Literal(b"X")).unwrap().unwrap();
        assert_eq!(first[0], Span::new(1, 2));
        let second = scanner.search(&Literal(b"X")).unwrap().unwrap();
        assert_eq!(second[0], Span::new(3, 4));
        assert_eq!(scanner.search(&Literal(b"X")).unwrap(), None);
    }

    #[test]
    fn test_search_respects_end_pos() {
        let mut buf = buffer("aXbXc");
        let mut scanner = buf.scanner(0, Some(2)).unwrap();
        let first = scanner.search(&Literal(b"X")).unwrap().unwrap();
        assert_eq!(first[0], Span::new(1, 2));
        assert_eq!(scanner.search(&Literal(b"X")).unwrap(), None);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut buf = buffer("abc");
        assert!(matches!(
            buf.scanner(3, Some(1)),
            Err(crate::BufferError::InvalidScanRange { start: 3, end: 1 })
        ));
    }
}
