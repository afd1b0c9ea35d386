//! Buffer addresses and their resolution to byte ranges.

use stred_buffer::{Span, TextBuffer};

use crate::matcher::PatternMatcher;
use crate::{CoreError, CoreResult};

/// How the two halves of a compound address relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    /// `a,b`: both halves resolve against the same state.
    Inclusive,
    /// `a;b`: the point moves to `a` before `b` resolves, so `b` may
    /// be relative to `a`.
    Sequential,
}

/// An address names a byte range in a buffer.
///
/// Simple addresses resolve to empty ranges (positions); compound
/// addresses combine the start of one with the end of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `#n`: the position exactly `n` bytes in.
    ByteOffset(usize),
    /// `n`: the position just after the `n`-th line terminator.
    LineOffset(usize),
    /// `$`: the end of the buffer.
    EndOfBuffer,
    /// `.`: wherever the point currently is.
    Point,
    /// `a,b` or `a;b`.
    Compound { kind: CompoundKind, begin: Box<Address>, end: Box<Address> },
}

impl Address {
    /// Resolves to a byte range against the current buffer state.
    pub fn resolve(&self, buffer: &mut TextBuffer) -> CoreResult<Span> {
        match self {
            Address::ByteOffset(n) => Ok(Span::at(*n)),
            Address::LineOffset(n) => Ok(Span::at(line_offset(buffer, *n)?)),
            Address::EndOfBuffer => Ok(Span::at(buffer.size())),
            Address::Point => Ok(buffer.point()?),
            Address::Compound { kind, begin, end } => {
                let begin = begin.resolve(buffer)?;
                if *kind == CompoundKind::Sequential {
                    buffer.set_point(begin);
                }
                let end = end.resolve(buffer)?;
                if end.end < begin.start {
                    return Err(CoreError::ReversedRange { start: begin.start, end: end.end });
                }
                Ok(Span::new(begin.start, end.end))
            }
        }
    }
}

/// Position just after the `n`-th line terminator, found by matching
/// `n` whole lines from the start of the buffer. Line 0 is the start
/// of the buffer; asking past the last terminator is an error.
pub fn line_offset(buffer: &mut TextBuffer, n: usize) -> CoreResult<usize> {
    let matcher = PatternMatcher::line_matcher(n)?;
    let mut scanner = buffer.scanner(0, None)?;
    match scanner.search(&matcher)? {
        Some(spans) => Ok(spans[0].end),
        None => Err(CoreError::LineOutOfRange(n)),
    }
}
