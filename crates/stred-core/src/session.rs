//! An editing session: one buffer, its rules, and an output sink.

use std::io::Write;

use stred_buffer::{BufferResult, Scanner, Span, TextBuffer};

use crate::command::{Command, Outcome};
use crate::config::Config;
use crate::matcher::RuleSet;
use crate::CoreResult;

/// Everything a command needs to run.
///
/// ## Learning: Dependency Injection over Globals
///
/// Commands receive the session by `&mut` instead of reaching for a
/// global buffer or stdout. Tests hand in an in-memory sink and read
/// back what was printed; the binary hands in locked stdout.
pub struct Session {
    pub buffer: TextBuffer,
    pub rules: RuleSet,
    config: Config,
    out: Box<dyn Write>,
}

impl Session {
    /// Session writing to stdout.
    pub fn new(buffer: TextBuffer) -> Self {
        Self::with_output(buffer, Box::new(std::io::stdout()))
    }

    /// Session with a custom output sink.
    pub fn with_output(buffer: TextBuffer, out: Box<dyn Write>) -> Self {
        let mut session = Self { buffer, rules: RuleSet::new(), config: Config::default(), out };
        session.apply_config_rules();
        session
    }

    /// Applies configuration: scan chunk size, print behavior, and
    /// preloaded named rules.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self.apply_config_rules();
        self
    }

    fn apply_config_rules(&mut self) {
        for (name, pattern) in &self.config.rules {
            self.rules.entry(name.clone()).or_insert_with(|| pattern.clone());
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one command against the buffer.
    pub fn run(&mut self, command: &Command) -> CoreResult<Outcome> {
        tracing::debug!(?command, "executing");
        command.execute(self)
    }

    /// A scanner over `[span.start, span.end)` honoring the configured
    /// chunk size.
    pub fn scanner(&mut self, span: Span) -> BufferResult<Scanner<'_>> {
        let chunk = self.config.editor.scan_chunk_size;
        Ok(self
            .buffer
            .scanner(span.start, Some(span.end))?
            .with_chunk_size(chunk))
    }

    /// Writes raw bytes to the output sink.
    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.out.write_all(bytes)
    }

    /// Prints `bytes`, adding the trailing newline `p` promises when
    /// the text does not bring its own.
    pub fn print(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.out.write_all(bytes)?;
        if self.config.editor.newline_after_print && !bytes.ends_with(b"\n") {
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }
}
