//! # Stred Core
//!
//! Command language for structural editing: addresses, patterns, and
//! the commands that tie them to a [`stred_buffer::TextBuffer`].
//!
//! ## Architecture Overview
//!
//! ```text
//! input text ──► Parser ──► Command ──► Session::run
//!                  │           │            │
//!               Address   PatternMatcher  TextBuffer
//! ```
//!
//! A script is a sequence of commands, each optionally prefixed by an
//! address. Executing a command resolves its address to a byte range,
//! moves the buffer's point there, and performs its edit. Looping and
//! conditional commands (`x`, `y`, `g`, `v`) narrow the point to match
//! ranges and run a sub-command over each, which is where the
//! "structural" in structural editing comes from.

pub mod address;
pub mod command;
pub mod config;
pub mod matcher;
pub mod parser;
pub mod session;

pub use address::{Address, CompoundKind};
pub use command::{spec_for, AddressKind, ArgShape, Command, CommandSpec, Outcome, COMMANDS};
pub use config::{Config, ConfigError, EditorConfig};
pub use matcher::{PatternMatcher, RuleSet};
pub use parser::Parser;
pub use session::Session;

use stred_buffer::BufferError;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced while resolving addresses or executing commands
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("line {0} is beyond the end of the buffer")]
    LineOutOfRange(usize),

    #[error("address range ends at {end}, before it begins at {start}")]
    ReversedRange { start: usize, end: usize },

    #[error("substitution refers to group {index} but the match has {count} groups")]
    CaptureIndexOutOfRange { index: usize, count: usize },

    #[error("bad pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("rule <{0}> expands into itself")]
    RecursiveRule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors detected while parsing command input
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("command {0:?} does not take an address")]
    AddressNotAllowed(&'static str),

    #[error("command {0:?} requires an address")]
    AddressRequired(&'static str),

    #[error("ran out of input while looking for {0}")]
    IncompleteInput(&'static str),

    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: String },
}
