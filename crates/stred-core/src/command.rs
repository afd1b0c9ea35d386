//! The editing commands and their execution.
//!
//! Every command resolves its address, moves the point there, and
//! performs its edit. The looping commands (`x`, `y`) collect all
//! matches first and then visit them in reverse buffer order, so the
//! edits a visit makes never shift the positions of matches still to
//! be visited.

use stred_buffer::{Side, Span};

use crate::address::Address;
use crate::matcher::PatternMatcher;
use crate::session::Session;
use crate::{CoreError, CoreResult};

/// Whether the command loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Terminate,
}

// ==================== Command Descriptors ====================

/// Whether a command accepts an address prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Forbidden,
    Optional,
    Required,
}

/// The shape of one argument in a command's syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// A delimited pattern, `/like this/`
    Pattern,
    /// Delimited text, or a dot-terminated block of lines
    Text,
    /// A single sub-command
    Command,
    /// Commands up to a closing `}`
    CommandList,
}

/// Static syntax description of one command, driving the parser.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub address: AddressKind,
    pub args: &'static [ArgShape],
}

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "a", address: AddressKind::Optional, args: &[ArgShape::Text] },
    CommandSpec { name: "i", address: AddressKind::Optional, args: &[ArgShape::Text] },
    CommandSpec { name: "c", address: AddressKind::Optional, args: &[ArgShape::Text] },
    CommandSpec { name: "d", address: AddressKind::Optional, args: &[] },
    CommandSpec { name: "p", address: AddressKind::Optional, args: &[] },
    CommandSpec { name: "q", address: AddressKind::Forbidden, args: &[] },
    CommandSpec { name: "def", address: AddressKind::Forbidden, args: &[ArgShape::Pattern, ArgShape::Pattern] },
    CommandSpec { name: "x", address: AddressKind::Optional, args: &[ArgShape::Pattern, ArgShape::Command] },
    CommandSpec { name: "y", address: AddressKind::Optional, args: &[ArgShape::Pattern, ArgShape::Command] },
    CommandSpec { name: "g", address: AddressKind::Optional, args: &[ArgShape::Pattern, ArgShape::Command] },
    CommandSpec { name: "v", address: AddressKind::Optional, args: &[ArgShape::Pattern, ArgShape::Command] },
    CommandSpec { name: "s", address: AddressKind::Optional, args: &[ArgShape::Pattern, ArgShape::Text] },
    CommandSpec { name: "{", address: AddressKind::Forbidden, args: &[ArgShape::CommandList] },
    CommandSpec { name: "}", address: AddressKind::Forbidden, args: &[] },
];

/// Looks up the syntax descriptor for a command name.
pub fn spec_for(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

// ==================== Commands ====================

/// A parsed command, ready to execute any number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `a`: insert text after the addressed range
    Append { address: Address, text: String },
    /// `i`: insert text before the addressed range
    Insert { address: Address, text: String },
    /// `c`: replace the addressed range with text
    Change { address: Address, text: String },
    /// `d`: delete the addressed range
    Delete { address: Address },
    /// `p`: print the addressed range
    Print { address: Address },
    /// `q`: stop executing commands
    Quit,
    /// `def`: register a named rule for later patterns
    Define { name: String, pattern: String },
    /// `{ … }`: run commands in sequence
    Compound(Vec<Command>),
    /// `x`: narrow to each match of the pattern, in reverse order
    Extract { address: Address, pattern: String, body: Box<Command> },
    /// `y`: narrow to each gap between matches, in reverse order
    Inject { address: Address, pattern: String, body: Box<Command> },
    /// `g`: run the body only if the range contains a match
    Guard { address: Address, pattern: String, body: Box<Command> },
    /// `v`: run the body only if the range contains no match
    InvertedGuard { address: Address, pattern: String, body: Box<Command> },
    /// `s`: replace the first match in the range
    Substitute { address: Address, pattern: String, replacement: String },
}

impl Command {
    pub fn execute(&self, session: &mut Session) -> CoreResult<Outcome> {
        match self {
            Command::Append { address, text } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                session.buffer.insert(text.as_bytes(), Side::After)?;
                Ok(Outcome::Continue)
            }
            Command::Insert { address, text } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                session.buffer.insert(text.as_bytes(), Side::Before)?;
                Ok(Outcome::Continue)
            }
            Command::Change { address, text } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                session.buffer.delete()?;
                session.buffer.insert(text.as_bytes(), Side::After)?;
                Ok(Outcome::Continue)
            }
            Command::Delete { address } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                session.buffer.delete()?;
                Ok(Outcome::Continue)
            }
            Command::Print { address } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                let bytes = session.buffer.read(span.start, Some(span.len()))?;
                session.print(&bytes)?;
                Ok(Outcome::Continue)
            }
            Command::Quit => Ok(Outcome::Terminate),
            Command::Define { name, pattern } => {
                tracing::debug!(name, pattern, "defining rule");
                session.rules.insert(name.clone(), pattern.clone());
                Ok(Outcome::Continue)
            }
            Command::Compound(commands) => {
                for command in commands {
                    if command.execute(session)? == Outcome::Terminate {
                        return Ok(Outcome::Terminate);
                    }
                }
                Ok(Outcome::Continue)
            }
            Command::Extract { address, pattern, body } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                let matcher = PatternMatcher::new(pattern, &session.rules)?;
                let matches = collect_matches(session, span, &matcher)?;
                tracing::debug!(count = matches.len(), "extract matches");
                for m in matches.iter().rev() {
                    session.buffer.set_point(*m);
                    if body.execute(session)? == Outcome::Terminate {
                        return Ok(Outcome::Terminate);
                    }
                }
                Ok(Outcome::Continue)
            }
            Command::Inject { address, pattern, body } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                let matcher = PatternMatcher::new(pattern, &session.rules)?;
                let matches = collect_matches(session, span, &matcher)?;
                // gaps between matches, walked back to front; the
                // leading gap comes last
                let mut gap_end = span.end;
                for m in matches.iter().rev() {
                    session.buffer.set_point(Span::new(m.end, gap_end));
                    if body.execute(session)? == Outcome::Terminate {
                        return Ok(Outcome::Terminate);
                    }
                    gap_end = m.start;
                }
                session.buffer.set_point(Span::new(span.start, gap_end));
                if body.execute(session)? == Outcome::Terminate {
                    return Ok(Outcome::Terminate);
                }
                Ok(Outcome::Continue)
            }
            Command::Guard { address, pattern, body } => {
                if guard_matches(session, address, pattern)? {
                    body.execute(session)
                } else {
                    Ok(Outcome::Continue)
                }
            }
            Command::InvertedGuard { address, pattern, body } => {
                if guard_matches(session, address, pattern)? {
                    Ok(Outcome::Continue)
                } else {
                    body.execute(session)
                }
            }
            Command::Substitute { address, pattern, replacement } => {
                let span = address.resolve(&mut session.buffer)?;
                session.buffer.set_point(span);
                let matcher = PatternMatcher::new(pattern, &session.rules)?;
                let found = {
                    let mut scanner = session.scanner(span)?;
                    scanner.search(&matcher)?
                };
                if let Some(spans) = found {
                    // capture contents must be read before the match
                    // text is gone
                    let replacement = build_replacement(session, replacement.as_bytes(), &spans)?;
                    session.buffer.set_point(spans[0]);
                    if !spans[0].is_empty() {
                        session.buffer.delete()?;
                    }
                    session.buffer.insert(&replacement, Side::After)?;
                }
                Ok(Outcome::Continue)
            }
        }
    }
}

/// All matches of `matcher` within `span`, in buffer order. A
/// zero-length match advances the scan by one byte so the collection
/// always terminates.
fn collect_matches(
    session: &mut Session,
    span: Span,
    matcher: &PatternMatcher,
) -> CoreResult<Vec<Span>> {
    let mut matches = Vec::new();
    let mut scanner = session.scanner(span)?;
    loop {
        let Some(spans) = scanner.search(matcher)? else {
            break;
        };
        let whole = spans[0];
        matches.push(whole);
        if whole.is_empty() {
            let pos = scanner.pos();
            scanner.set_pos(pos + 1);
        }
    }
    Ok(matches)
}

fn guard_matches(session: &mut Session, address: &Address, pattern: &str) -> CoreResult<bool> {
    let span = address.resolve(&mut session.buffer)?;
    session.buffer.set_point(span);
    let matcher = PatternMatcher::new(pattern, &session.rules)?;
    let mut scanner = session.scanner(span)?;
    Ok(scanner.search(&matcher)?.is_some())
}

/// Expands a substitute replacement: `\N` becomes the text of capture
/// group `N`, `\\` a literal backslash. Group text is read from the
/// buffer while the match is still in place.
fn build_replacement(
    session: &mut Session,
    template: &[u8],
    spans: &[Span],
) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(template.len());
    let mut bytes = template.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.peek().copied() {
            Some(b'\\') => {
                bytes.next();
                out.push(b'\\');
            }
            Some(d) if d.is_ascii_digit() => {
                let mut index = 0usize;
                while let Some(d) = bytes.peek().copied() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    bytes.next();
                    index = index * 10 + (d - b'0') as usize;
                }
                let group = spans
                    .get(index)
                    .copied()
                    .ok_or(CoreError::CaptureIndexOutOfRange { index, count: spans.len() })?;
                out.extend_from_slice(&session.buffer.read(group.start, Some(group.len()))?);
            }
            _ => out.push(b'\\'),
        }
    }
    Ok(out)
}
