//! Parsing command input into [`Command`] values.
//!
//! Input is pulled line by line, on demand: a command may continue
//! onto following lines (delimited text spanning a newline, a `{`
//! block, a dot-terminated text block), and the parser only asks the
//! source for more input when the command it is in the middle of
//! needs it. Running dry mid-command is an error; running dry between
//! commands is the end of the script.

use std::io::BufRead;

use crate::address::{Address, CompoundKind};
use crate::command::{spec_for, AddressKind, Command};
use crate::{CoreResult, ParseError};

enum Parsed {
    Cmd(Command),
    Close,
}

/// Streaming command parser.
pub struct Parser<R> {
    input: R,
    buf: String,
    pos: usize,
    eof: bool,
}

impl Parser<std::io::Cursor<Vec<u8>>> {
    /// Parser over an in-memory script.
    pub fn from_script(script: impl Into<String>) -> Self {
        Parser::new(std::io::Cursor::new(script.into().into_bytes()))
    }
}

impl<R: BufRead> Parser<R> {
    pub fn new(input: R) -> Self {
        Self { input, buf: String::new(), pos: 0, eof: false }
    }

    /// Parses the next command, or `None` at a clean end of input.
    pub fn parse_command(&mut self) -> CoreResult<Option<Command>> {
        if !self.skip_to_content()? {
            return Ok(None);
        }
        match self.parse_one()? {
            Parsed::Cmd(command) => Ok(Some(command)),
            Parsed::Close => {
                Err(ParseError::Expected { expected: "command", found: "}".into() }.into())
            }
        }
    }

    /// Parses the remaining input as a whole script.
    pub fn parse_script(&mut self) -> CoreResult<Vec<Command>> {
        let mut commands = Vec::new();
        while let Some(command) = self.parse_command()? {
            commands.push(command);
        }
        Ok(commands)
    }

    // ==================== Input Plumbing ====================

    /// Pulls one more line from the source. False at end of input.
    fn fill(&mut self) -> CoreResult<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.push_str(&line);
        Ok(true)
    }

    fn peek(&self) -> Option<char> {
        self.buf[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Next character, pulling more lines as needed. `what` names the
    /// construct being parsed, for the error when input runs out.
    fn getch(&mut self, what: &'static str) -> CoreResult<char> {
        loop {
            if let Some(c) = self.bump() {
                return Ok(c);
            }
            if !self.fill()? {
                return Err(ParseError::IncompleteInput(what).into());
            }
        }
    }

    fn skip_buffered_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// Skips whitespace, pulling lines, until a non-blank character
    /// is buffered. False at end of input.
    fn skip_to_content(&mut self) -> CoreResult<bool> {
        loop {
            self.skip_buffered_ws();
            if self.peek().is_some() {
                return Ok(true);
            }
            if !self.fill()? {
                return Ok(false);
            }
        }
    }

    fn require_content(&mut self, what: &'static str) -> CoreResult<char> {
        if !self.skip_to_content()? {
            return Err(ParseError::IncompleteInput(what).into());
        }
        Ok(self.peek().unwrap_or_default())
    }

    /// True when nothing but whitespace remains on the current line.
    fn rest_of_line_blank(&self) -> bool {
        self.buf[self.pos..]
            .chars()
            .take_while(|&c| c != '\n')
            .all(char::is_whitespace)
    }

    fn consume_rest_of_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    /// One full line including its terminator, pulling input as
    /// needed. A final unterminated line is returned as-is.
    fn read_line(&mut self, what: &'static str) -> CoreResult<String> {
        let mut line = String::new();
        loop {
            while let Some(c) = self.bump() {
                line.push(c);
                if c == '\n' {
                    return Ok(line);
                }
            }
            if !self.fill()? {
                if line.is_empty() {
                    return Err(ParseError::IncompleteInput(what).into());
                }
                return Ok(line);
            }
        }
    }

    // ==================== Grammar ====================

    fn parse_one(&mut self) -> CoreResult<Parsed> {
        let address = self.parse_address()?;
        let name = self.parse_command_name()?;
        if name == "}" {
            if address.is_some() {
                return Err(ParseError::AddressNotAllowed("}").into());
            }
            return Ok(Parsed::Close);
        }
        let spec =
            spec_for(&name).ok_or_else(|| ParseError::UnknownCommand(name.clone()))?;
        match spec.address {
            AddressKind::Forbidden if address.is_some() => {
                return Err(ParseError::AddressNotAllowed(spec.name).into());
            }
            AddressKind::Required if address.is_none() => {
                return Err(ParseError::AddressRequired(spec.name).into());
            }
            _ => {}
        }
        let address = address.unwrap_or(Address::Point);

        let command = match name.as_str() {
            "a" => Command::Append { address, text: self.parse_text()? },
            "i" => Command::Insert { address, text: self.parse_text()? },
            "c" => Command::Change { address, text: self.parse_text()? },
            "d" => Command::Delete { address },
            "p" => Command::Print { address },
            "q" => Command::Quit,
            "def" => {
                let name = self.parse_pattern()?;
                let pattern = self.parse_pattern()?;
                Command::Define { name, pattern }
            }
            "x" => Command::Extract {
                address,
                pattern: self.parse_pattern()?,
                body: Box::new(self.parse_sub_command()?),
            },
            "y" => Command::Inject {
                address,
                pattern: self.parse_pattern()?,
                body: Box::new(self.parse_sub_command()?),
            },
            "g" => Command::Guard {
                address,
                pattern: self.parse_pattern()?,
                body: Box::new(self.parse_sub_command()?),
            },
            "v" => Command::InvertedGuard {
                address,
                pattern: self.parse_pattern()?,
                body: Box::new(self.parse_sub_command()?),
            },
            "s" => Command::Substitute {
                address,
                pattern: self.parse_pattern()?,
                replacement: self.parse_text()?,
            },
            "{" => {
                let mut commands = Vec::new();
                loop {
                    match self.parse_one()? {
                        Parsed::Close => break,
                        Parsed::Cmd(command) => commands.push(command),
                    }
                }
                Command::Compound(commands)
            }
            _ => unreachable!("descriptor table and match arms disagree on {name:?}"),
        };
        Ok(Parsed::Cmd(command))
    }

    fn parse_command_name(&mut self) -> CoreResult<String> {
        let c = self.require_content("command")?;
        if c == '{' || c == '}' {
            self.bump();
            return Ok(c.to_string());
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(ParseError::Expected { expected: "command", found: c.to_string() }.into());
        }
        Ok(name)
    }

    fn parse_sub_command(&mut self) -> CoreResult<Command> {
        match self.parse_one()? {
            Parsed::Cmd(command) => Ok(command),
            Parsed::Close => {
                Err(ParseError::Expected { expected: "command", found: "}".into() }.into())
            }
        }
    }

    // ==================== Addresses ====================

    fn parse_address(&mut self) -> CoreResult<Option<Address>> {
        self.require_content("address or command")?;
        let simple = self.parse_simple_address()?;
        self.skip_buffered_ws();
        let separator = match self.peek() {
            Some(c @ (',' | ';')) => c,
            _ => return Ok(simple),
        };
        self.bump();
        let begin = simple.unwrap_or(Address::ByteOffset(0));
        // a missing or `.` right half means the end of the buffer, so
        // a bare `,` spans the whole buffer
        let end = match self.parse_address()? {
            None | Some(Address::Point) => Address::EndOfBuffer,
            Some(address) => address,
        };
        let kind = match separator {
            ',' => CompoundKind::Inclusive,
            _ => CompoundKind::Sequential,
        };
        Ok(Some(Address::Compound {
            kind,
            begin: Box::new(begin),
            end: Box::new(end),
        }))
    }

    fn parse_simple_address(&mut self) -> CoreResult<Option<Address>> {
        match self.peek() {
            Some('#') => {
                self.bump();
                Ok(Some(Address::ByteOffset(self.parse_number()?)))
            }
            Some(c) if c.is_ascii_digit() => Ok(Some(Address::LineOffset(self.parse_number()?))),
            Some('$') => {
                self.bump();
                Ok(Some(Address::EndOfBuffer))
            }
            Some('.') => {
                self.bump();
                Ok(Some(Address::Point))
            }
            _ => Ok(None),
        }
    }

    fn parse_number(&mut self) -> CoreResult<usize> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        digits.parse().map_err(|_| {
            ParseError::Expected {
                expected: "number",
                found: self.peek().map(String::from).unwrap_or_default(),
            }
            .into()
        })
    }

    // ==================== Tokens ====================

    /// A delimited token: the first character is the delimiter, the
    /// token runs to its next unescaped occurrence and may span
    /// lines. `\` before the delimiter escapes it; any other escape
    /// is kept verbatim for the regex engine.
    fn parse_pattern(&mut self) -> CoreResult<String> {
        let delim = self.parse_delimiter("pattern")?;
        self.scan_delimited(delim)
    }

    /// The opening delimiter of a pattern or text token. Letters,
    /// digits, and `_` cannot delimit.
    fn parse_delimiter(&mut self, what: &'static str) -> CoreResult<char> {
        let delim = self.require_content(what)?;
        if delim.is_alphanumeric() || delim == '_' {
            return Err(ParseError::Expected {
                expected: "delimiter",
                found: delim.to_string(),
            }
            .into());
        }
        self.bump();
        Ok(delim)
    }

    fn scan_delimited(&mut self, delim: char) -> CoreResult<String> {
        let mut out = String::new();
        loop {
            let c = self.getch("closing delimiter")?;
            if c == '\\' {
                let next = self.getch("escaped character")?;
                if next == delim {
                    out.push(delim);
                } else {
                    out.push('\\');
                    out.push(next);
                }
            } else if c == delim {
                return Ok(out);
            } else {
                out.push(c);
            }
        }
    }

    /// A text argument: delimited when it starts on the same line,
    /// otherwise a block of whole lines terminated by a lone `.`. In
    /// a block, a line starting with `\.` sheds the backslash.
    fn parse_text(&mut self) -> CoreResult<String> {
        if !self.rest_of_line_blank() {
            self.skip_buffered_ws();
            let delim = self.parse_delimiter("text")?;
            return self.scan_delimited(delim);
        }
        self.consume_rest_of_line();
        let mut text = String::new();
        loop {
            let line = self.read_line("text block terminated by '.'")?;
            if line == "." || line == ".\n" {
                return Ok(text);
            }
            match line.strip_prefix("\\.") {
                Some(rest) => {
                    text.push('.');
                    text.push_str(rest);
                }
                None => text.push_str(&line),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    fn parse(script: &str) -> Command {
        Parser::from_script(script).parse_command().unwrap().unwrap()
    }

    fn parse_err(script: &str) -> CoreError {
        Parser::from_script(script).parse_command().unwrap_err()
    }

    #[test]
    fn test_empty_input() {
        assert!(Parser::from_script("").parse_command().unwrap().is_none());
        assert!(Parser::from_script("  \n\n  ").parse_command().unwrap().is_none());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("q"), Command::Quit);
        assert_eq!(parse("d"), Command::Delete { address: Address::Point });
        assert_eq!(parse("p"), Command::Print { address: Address::Point });
    }

    #[test]
    fn test_addresses() {
        assert_eq!(parse("#12d"), Command::Delete { address: Address::ByteOffset(12) });
        assert_eq!(parse("3d"), Command::Delete { address: Address::LineOffset(3) });
        assert_eq!(parse("$d"), Command::Delete { address: Address::EndOfBuffer });
        assert_eq!(parse(".d"), Command::Delete { address: Address::Point });
    }

    #[test]
    fn test_compound_address() {
        assert_eq!(
            parse("1,2p"),
            Command::Print {
                address: Address::Compound {
                    kind: CompoundKind::Inclusive,
                    begin: Box::new(Address::LineOffset(1)),
                    end: Box::new(Address::LineOffset(2)),
                }
            }
        );
        assert_eq!(
            parse("1;#8p"),
            Command::Print {
                address: Address::Compound {
                    kind: CompoundKind::Sequential,
                    begin: Box::new(Address::LineOffset(1)),
                    end: Box::new(Address::ByteOffset(8)),
                }
            }
        );
    }

    #[test]
    fn test_bare_comma_is_whole_buffer() {
        assert_eq!(
            parse(",p"),
            Command::Print {
                address: Address::Compound {
                    kind: CompoundKind::Inclusive,
                    begin: Box::new(Address::ByteOffset(0)),
                    end: Box::new(Address::EndOfBuffer),
                }
            }
        );
    }

    #[test]
    fn test_nested_compound_address() {
        // right-associative: a,b,c parses as a,(b,c)
        assert_eq!(
            parse("1,2,3p"),
            Command::Print {
                address: Address::Compound {
                    kind: CompoundKind::Inclusive,
                    begin: Box::new(Address::LineOffset(1)),
                    end: Box::new(Address::Compound {
                        kind: CompoundKind::Inclusive,
                        begin: Box::new(Address::LineOffset(2)),
                        end: Box::new(Address::LineOffset(3)),
                    }),
                }
            }
        );
    }

    #[test]
    fn test_delimited_text() {
        assert_eq!(
            parse("a/hello/"),
            Command::Append { address: Address::Point, text: "hello".into() }
        );
        // any punctuation delimits
        assert_eq!(
            parse("a|hi|"),
            Command::Append { address: Address::Point, text: "hi".into() }
        );
        // escaped delimiter
        assert_eq!(
            parse("a/a\\/b/"),
            Command::Append { address: Address::Point, text: "a/b".into() }
        );
    }

    #[test]
    fn test_text_block() {
        assert_eq!(
            parse("a\nhello\nworld\n.\n"),
            Command::Append { address: Address::Point, text: "hello\nworld\n".into() }
        );
    }

    #[test]
    fn test_text_block_escaped_dot() {
        assert_eq!(
            parse("a\n\\.\n.\n"),
            Command::Append { address: Address::Point, text: ".\n".into() }
        );
    }

    #[test]
    fn test_substitute() {
        // pattern and replacement are separate tokens, each with its
        // own delimiters
        assert_eq!(
            parse("s/foo/ /bar/"),
            Command::Substitute {
                address: Address::Point,
                pattern: "foo".into(),
                replacement: "bar".into(),
            }
        );
        assert_eq!(
            parse("s/foo//bar/"),
            Command::Substitute {
                address: Address::Point,
                pattern: "foo".into(),
                replacement: "bar".into(),
            }
        );
    }

    #[test]
    fn test_define() {
        assert_eq!(
            parse("def /word/ /[a-z]+/"),
            Command::Define { name: "word".into(), pattern: "[a-z]+".into() }
        );
    }

    #[test]
    fn test_extract_with_sub_command() {
        assert_eq!(
            parse(",x/[0-9]+/ d"),
            Command::Extract {
                address: Address::Compound {
                    kind: CompoundKind::Inclusive,
                    begin: Box::new(Address::ByteOffset(0)),
                    end: Box::new(Address::EndOfBuffer),
                },
                pattern: "[0-9]+".into(),
                body: Box::new(Command::Delete { address: Address::Point }),
            }
        );
    }

    #[test]
    fn test_guard_chain() {
        assert_eq!(
            parse("x/.*\\n/ g/foo/ p"),
            Command::Extract {
                address: Address::Point,
                pattern: ".*\\n".into(),
                body: Box::new(Command::Guard {
                    address: Address::Point,
                    pattern: "foo".into(),
                    body: Box::new(Command::Print { address: Address::Point }),
                }),
            }
        );
    }

    #[test]
    fn test_compound_command() {
        assert_eq!(
            parse("{\np\nq\n}"),
            Command::Compound(vec![
                Command::Print { address: Address::Point },
                Command::Quit,
            ])
        );
    }

    #[test]
    fn test_pattern_spanning_lines() {
        assert_eq!(
            parse("s/a\nb/ /c/"),
            Command::Substitute {
                address: Address::Point,
                pattern: "a\nb".into(),
                replacement: "c".into(),
            }
        );
    }

    #[test]
    fn test_multiple_commands() {
        let commands = Parser::from_script("p\nq\n").parse_script().unwrap();
        assert_eq!(
            commands,
            vec![Command::Print { address: Address::Point }, Command::Quit]
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            parse_err("zz"),
            CoreError::Parse(ParseError::UnknownCommand(name)) if name == "zz"
        ));
    }

    #[test]
    fn test_address_not_allowed() {
        assert!(matches!(
            parse_err("3q"),
            CoreError::Parse(ParseError::AddressNotAllowed("q"))
        ));
        // an explicit `.` is still an address
        assert!(matches!(
            parse_err(".q"),
            CoreError::Parse(ParseError::AddressNotAllowed("q"))
        ));
    }

    #[test]
    fn test_alphanumeric_delimiter_rejected() {
        assert!(matches!(
            parse_err("s zfooz /bar/"),
            CoreError::Parse(ParseError::Expected { expected: "delimiter", .. })
        ));
        assert!(matches!(
            parse_err("a zhiz"),
            CoreError::Parse(ParseError::Expected { expected: "delimiter", .. })
        ));
    }

    #[test]
    fn test_incomplete_pattern() {
        assert!(matches!(
            parse_err("s/foo"),
            CoreError::Parse(ParseError::IncompleteInput(_))
        ));
    }

    #[test]
    fn test_incomplete_block() {
        assert!(matches!(
            parse_err("a\nno terminator"),
            CoreError::Parse(ParseError::IncompleteInput(_))
        ));
    }

    #[test]
    fn test_unopened_close_brace() {
        assert!(matches!(
            parse_err("}"),
            CoreError::Parse(ParseError::Expected { .. })
        ));
    }

    #[test]
    fn test_number_required_after_hash() {
        assert!(matches!(
            parse_err("#d"),
            CoreError::Parse(ParseError::Expected { expected: "number", .. })
        ));
    }
}
