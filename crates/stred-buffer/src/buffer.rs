//! The text buffer: piece table plus backing stores plus the point.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use crate::added::AddedStore;
use crate::origin::{OriginCache, Source};
use crate::piece::{Origin, Piece};
use crate::scanner::Scanner;
use crate::tree::{PieceIter, PieceTable, Side};
use crate::{BufferError, BufferResult, Span};

/// Which end of the point to bind to a piece.
#[derive(Debug, Clone, Copy)]
enum Bound {
    First,
    Last,
}

#[derive(Debug, Clone, Copy)]
enum PointBound {
    Unbound,
    Bound(PieceIter),
}

/// The current selection, either as an explicit range or as a pair of
/// piece bindings from which the range is recomputed on demand.
///
/// Binding is deferred until an edit actually needs a piece boundary
/// at the point: moving the point is then free, and only edits pay
/// for piece splits.
#[derive(Debug, Clone, Copy)]
struct Point {
    range: Option<Span>,
    first: PointBound,
    last: PointBound,
}

impl Point {
    fn at(span: Span) -> Self {
        Self { range: Some(span), first: PointBound::Unbound, last: PointBound::Unbound }
    }
}

/// A byte-oriented editable document.
///
/// The source is immutable; all edits are recorded as pieces over the
/// source and an append-only added store. Reads stitch the document
/// back together piece by piece.
///
/// ## Learning: Interior State vs. Shared References
///
/// `read` takes `&mut self` because serving origin bytes may slide the
/// cache window. The alternative (interior mutability via `RefCell`)
/// would hide that cost from the type signature; keeping it visible
/// makes call sites honest about when IO can happen.
#[derive(Debug)]
pub struct TextBuffer {
    pieces: PieceTable,
    original: OriginCache,
    added: AddedStore,
    point: Point,
}

impl TextBuffer {
    /// Builds a buffer over any seekable source.
    pub fn from_reader(source: impl Source + 'static) -> BufferResult<Self> {
        let original = OriginCache::new(source)?;
        let mut pieces = PieceTable::new();
        if original.len() > 0 {
            pieces.insert(None, Piece::new(Origin::Original, 0, original.len()), Side::After)?;
        }
        tracing::debug!(size = original.len(), "opened buffer");
        Ok(Self {
            pieces,
            original,
            added: AddedStore::new(),
            point: Point::at(Span::at(0)),
        })
    }

    /// Opens a file as the immutable source.
    pub fn from_file(path: impl AsRef<Path>) -> BufferResult<Self> {
        Self::from_reader(File::open(path)?)
    }

    /// Buffer over an in-memory source. Handy for scripts and tests.
    pub fn from_text(text: impl Into<Vec<u8>>) -> BufferResult<Self> {
        Self::from_reader(Cursor::new(text.into()))
    }

    /// Current size of the edited document in bytes.
    pub fn size(&self) -> usize {
        self.pieces.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of pieces currently in the table.
    pub fn piece_count(&self) -> usize {
        self.pieces.piece_count()
    }

    // ==================== Point ====================

    /// The current point as a byte range.
    ///
    /// When the point is held as piece bindings, the range is
    /// recomputed from the bound pieces' live positions, so it tracks
    /// edits made since it was bound.
    pub fn point(&self) -> BufferResult<Span> {
        if let Some(range) = self.point.range {
            return Ok(range);
        }
        match (self.point.first, self.point.last) {
            (PointBound::Bound(f), PointBound::Bound(l)) => {
                Ok(Span::new(self.pieces.pos(f)?, self.pieces.pos(l)?))
            }
            _ => Ok(Span::at(0)),
        }
    }

    /// Moves the point. Accepts a `Span`, a `Range<usize>`, or a bare
    /// position for an empty point.
    pub fn set_point(&mut self, span: impl Into<Span>) {
        self.point = Point::at(span.into());
    }

    /// Binds one end of the point to a piece boundary, splitting the
    /// piece under the position when it falls in the interior. The
    /// bound piece is the one that starts at the position; binding at
    /// the very end of the buffer yields a zero-size piece there.
    fn materialize(&mut self, bound: Bound) -> BufferResult<PieceIter> {
        let existing = match bound {
            Bound::First => self.point.first,
            Bound::Last => self.point.last,
        };
        if let PointBound::Bound(it) = existing
            && self.pieces.piece(it).is_ok()
        {
            return Ok(it);
        }

        let range = self.point()?;
        let pos = match bound {
            Bound::First => range.start,
            Bound::Last => range.end,
        };
        let size = self.pieces.size();
        if pos > size {
            return Err(BufferError::OutOfRange { pos, size });
        }
        let it = if size == 0 {
            // a fully deleted buffer may still hold a zero-size piece
            self.pieces.first().ok_or(BufferError::OutOfRange { pos, size })?
        } else {
            // at pos == size there is no containing piece; bind via
            // the piece holding the final byte, which the split below
            // turns into a zero-size piece at the end
            let lookup_pos = if pos == size { size - 1 } else { pos };
            self.pieces
                .lookup(lookup_pos)
                .ok_or(BufferError::OutOfRange { pos, size })?
        };
        let start = self.pieces.pos(it)?;
        let piece = self.pieces.piece(it)?;

        let it = if pos > start {
            let keep = pos - start;
            let right = Piece::new(piece.origin, piece.offset + keep, piece.size - keep);
            self.pieces.truncate(it, keep)?;
            self.pieces.insert(Some(it), right, Side::After)?
        } else {
            it
        };
        match bound {
            Bound::First => self.point.first = PointBound::Bound(it),
            Bound::Last => self.point.last = PointBound::Bound(it),
        }
        Ok(it)
    }

    // ==================== Reading ====================

    /// Reads `len` bytes starting at `pos`, or through the end of the
    /// buffer when `len` is `None`.
    pub fn read(&mut self, pos: usize, len: Option<usize>) -> BufferResult<Vec<u8>> {
        let size = self.size();
        let len = match len {
            Some(len) => len,
            None => size.saturating_sub(pos),
        };
        if pos + len > size || pos > size {
            return Err(BufferError::OutOfRange { pos: pos + len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(len);
        let mut it = self
            .pieces
            .lookup(pos)
            .ok_or(BufferError::OutOfRange { pos, size })?;
        let start = self.pieces.pos(it)?;
        let piece = self.pieces.piece(it)?;
        let skip = pos - start;
        let take = (piece.size - skip).min(len);
        self.copy_from_store(&piece, skip, take, &mut out)?;
        let mut remaining = len - take;
        while remaining > 0 {
            it = self
                .pieces
                .next(it)?
                .ok_or(BufferError::OutOfRange { pos: pos + len, size })?;
            let piece = self.pieces.piece(it)?;
            let take = piece.size.min(remaining);
            self.copy_from_store(&piece, 0, take, &mut out)?;
            remaining -= take;
        }
        Ok(out)
    }

    /// The whole document. Mostly for small buffers and tests.
    pub fn contents(&mut self) -> BufferResult<Vec<u8>> {
        self.read(0, None)
    }

    fn copy_from_store(
        &mut self,
        piece: &Piece,
        skip: usize,
        len: usize,
        out: &mut Vec<u8>,
    ) -> BufferResult<()> {
        match piece.origin {
            Origin::Original => self.original.read(piece.offset + skip, len, out),
            Origin::Added => {
                out.extend_from_slice(self.added.slice(piece.offset + skip, len)?);
                Ok(())
            }
        }
    }

    // ==================== Editing ====================

    /// Inserts `text` before or after the point.
    ///
    /// `Before` leaves the point covering the same text it covered,
    /// shifted past the insertion; `After` grows the point to cover
    /// the inserted text. Consecutive insertions that land where the
    /// previous one ended extend that piece instead of adding one.
    pub fn insert(&mut self, text: &[u8], side: Side) -> BufferResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        let n = text.len();
        let added_end = self.added.len();
        let offset = self.added.append(text);
        let range = self.point()?;
        tracing::trace!(len = n, pos = range.start, ?side, "insert");

        if self.pieces.is_empty() {
            self.pieces.insert(None, Piece::new(Origin::Added, offset, n), Side::After)?;
            self.point = Point::at(match side {
                Side::Before => Span::new(range.start + n, range.end + n),
                Side::After => Span::new(range.start, range.end + n),
            });
            return Ok(());
        }

        match side {
            Side::Before => {
                let first = self.materialize(Bound::First)?;
                let merged = match self.pieces.prev(first)? {
                    Some(prev) => {
                        let p = self.pieces.piece(prev)?;
                        if p.origin == Origin::Added && p.end() == added_end {
                            self.pieces.extend(prev, n)?;
                            true
                        } else {
                            false
                        }
                    }
                    None => false,
                };
                if !merged {
                    self.pieces
                        .insert(Some(first), Piece::new(Origin::Added, offset, n), Side::Before)?;
                }
                self.point.range = Some(Span::new(range.start + n, range.end + n));
            }
            Side::After => {
                if range.end == self.size() {
                    let last = self
                        .pieces
                        .last()
                        .ok_or(BufferError::OutOfRange { pos: range.end, size: 0 })?;
                    let p = self.pieces.piece(last)?;
                    if p.origin == Origin::Added && p.end() == added_end {
                        self.pieces.extend(last, n)?;
                    } else {
                        self.pieces
                            .insert(Some(last), Piece::new(Origin::Added, offset, n), Side::After)?;
                    }
                } else {
                    let last = self.materialize(Bound::Last)?;
                    let coincides = matches!(self.point.first, PointBound::Bound(f) if f == last);
                    let p = self.pieces.piece(last)?;
                    if coincides && p.origin == Origin::Added && p.size == 0 {
                        // the point's own empty piece: turn it into
                        // the freshly added text
                        self.pieces.set_piece(last, Piece::new(Origin::Added, offset, n))?;
                    } else {
                        self.pieces
                            .insert(Some(last), Piece::new(Origin::Added, offset, n), Side::Before)?;
                    }
                }
                self.point.range = Some(Span::new(range.start, range.end + n));
            }
        }
        Ok(())
    }

    /// Deletes the text the point covers; an empty point deletes the
    /// single byte after it. Afterwards the point is empty at the
    /// deletion site.
    pub fn delete(&mut self) -> BufferResult<()> {
        if self.pieces.is_empty() {
            return Err(BufferError::BeyondBuffer);
        }
        let first = self.materialize(Bound::First)?;
        let last = self.materialize(Bound::Last)?;
        let first_pos = self.pieces.pos(first)?;
        let last_pos = self.pieces.pos(last)?;
        tracing::trace!(start = first_pos, end = last_pos, "delete");

        if first_pos == last_pos {
            // empty point: eat one byte off the front of the piece
            // after it
            let piece = self.pieces.piece(last)?;
            if piece.size == 0 {
                return Err(BufferError::BeyondBuffer);
            }
            self.pieces.trim_front(last, 1)?;
            if self.pieces.piece(last)?.size == 0 {
                self.pieces.delete(last)?;
                self.point = Point::at(Span::at(first_pos));
            } else {
                self.point.first = PointBound::Bound(last);
                self.point.last = PointBound::Bound(last);
                self.point.range = Some(Span::at(first_pos));
            }
            return Ok(());
        }

        // non-empty point: unlink whole pieces until the last bound
        // piece has slid back to the start of the range
        let mut cur = first;
        while self.pieces.pos(last)? != first_pos {
            let doomed = cur;
            cur = self
                .pieces
                .next(doomed)?
                .ok_or(BufferError::BeyondBuffer)?;
            self.pieces.delete(doomed)?;
        }
        self.point.first = PointBound::Bound(cur);
        self.point.last = PointBound::Bound(last);
        self.point.range = None;
        Ok(())
    }

    // ==================== Scanning ====================

    /// A scanner over `[pos, end_pos)`, or through the end of the
    /// buffer when `end_pos` is `None`.
    pub fn scanner(&mut self, pos: usize, end_pos: Option<usize>) -> BufferResult<Scanner<'_>> {
        if let Some(end) = end_pos
            && pos > end
        {
            return Err(BufferError::InvalidScanRange { start: pos, end });
        }
        Ok(Scanner::new(self, pos, end_pos))
    }
}
