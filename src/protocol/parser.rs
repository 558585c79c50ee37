//! Request Parser
//!
//! A request is a single line:
//!
//! ```text
//! COMMAND (SP argument)*
//! ```
//!
//! An argument is either
//! - **unquoted**: a run of characters other than space and newline, or
//! - **quoted**: `"` ... `"`, where `\"` stands for one embedded quote.
//!   Quoting is needed whenever an argument contains a space.
//!
//! ## Two stages
//!
//! 1. [`parse_command`] classifies the command word. A word only counts if
//!    it is followed by the terminator its family accepts: commands that
//!    always take arguments need a space, argument-less commands accept a
//!    space, a line break or end of input. Anything else is
//!    [`Command::Unknown`].
//! 2. A [`Cursor`] over the rest of the line hands out tokens one at a time,
//!    each checked against the bound of the slot it fills.
//!
//! ```
//! use linekv::protocol::{Command, Request};
//!
//! let mut req = Request::parse(r#"SET greeting "hello world""#);
//! assert_eq!(req.command, Command::Set);
//! assert_eq!(req.args.next_key().unwrap(), "greeting");
//! assert_eq!(req.args.next_value().unwrap(), "hello world");
//! assert!(req.args.finish().is_ok());
//! ```

use crate::storage::{MAX_FIELD_LEN, MAX_KEY_LEN, MAX_VALUE_LEN};
use std::fmt;
use thiserror::Error;

/// Errors produced while tokenizing a request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Missing token, unterminated quote, stray characters
    #[error("parse error")]
    Syntax,

    /// A key or field token exceeds its bound
    #[error("key too long")]
    KeyTooLong,

    /// A value token exceeds its bound
    #[error("value too long")]
    ValueTooLong,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// The closed set of commands understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Time,
    Info,
    Goodbye,
    Set,
    Get,
    Del,
    Mset,
    Mget,
    Type,
    Hset,
    Hget,
    Hmget,
    Hincrby,
    Unknown,
}

/// Command words and the command they classify as.
const COMMAND_WORDS: &[(&str, Command)] = &[
    ("PING", Command::Ping),
    ("TIME", Command::Time),
    ("INFO", Command::Info),
    ("GOODBYE", Command::Goodbye),
    ("SET", Command::Set),
    ("GET", Command::Get),
    ("DEL", Command::Del),
    ("MSET", Command::Mset),
    ("MGET", Command::Mget),
    ("TYPE", Command::Type),
    ("HSET", Command::Hset),
    ("HGET", Command::Hget),
    ("HMGET", Command::Hmget),
    ("HINCRBY", Command::Hincrby),
];

impl Command {
    pub fn name(&self) -> &'static str {
        COMMAND_WORDS
            .iter()
            .find(|(_, cmd)| cmd == self)
            .map(|(word, _)| *word)
            .unwrap_or("UNKNOWN")
    }

    /// Whether the command word must be followed by a space.
    pub fn takes_arguments(&self) -> bool {
        !matches!(
            self,
            Command::Ping | Command::Time | Command::Info | Command::Goodbye | Command::Unknown
        )
    }

    fn accepts_terminator(&self, next: Option<char>) -> bool {
        if self.takes_arguments() {
            next == Some(' ')
        } else {
            matches!(next, None | Some(' ' | '\n' | '\r'))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies the command word at the start of `line`.
///
/// Returns the command and the text following the command word.
pub fn parse_command(line: &str) -> (Command, &str) {
    for &(word, cmd) in COMMAND_WORDS {
        if let Some(rest) = line.strip_prefix(word) {
            if cmd.accepts_terminator(rest.chars().next()) {
                return (cmd, rest);
            }
        }
    }
    (Command::Unknown, line)
}

#[inline]
fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

#[inline]
fn is_separator(c: char) -> bool {
    c == ' ' || is_line_break(c)
}

/// A cursor over the arguments of a request.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input.trim_start_matches(' '),
        }
    }

    /// The unconsumed input.
    pub fn remaining(&self) -> &'a str {
        self.rest
    }

    /// True once only spaces and line breaks remain.
    pub fn is_empty(&self) -> bool {
        self.rest.trim_start_matches(is_separator).is_empty()
    }

    /// Reads the next token, unescaping it if quoted, and skips the spaces
    /// that follow it.
    ///
    /// Fails with `too_long` if the unescaped token exceeds `limit` bytes.
    pub fn next_token(&mut self, limit: usize, too_long: ParseError) -> ParseResult<String> {
        let input = self.rest.trim_start_matches(' ');

        let (token, consumed) = match input.strip_prefix('"') {
            Some(body) => {
                let (token, len) = unquote(body)?;
                (token, 1 + len)
            }
            None => {
                let len = input.find(is_separator).unwrap_or(input.len());
                if len == 0 {
                    return Err(ParseError::Syntax);
                }
                (input[..len].to_string(), len)
            }
        };

        // A closing quote must end the token
        if let Some(next) = input[consumed..].chars().next() {
            if !is_separator(next) {
                return Err(ParseError::Syntax);
            }
        }

        if token.contains('\0') {
            return Err(ParseError::Syntax);
        }
        if token.len() > limit {
            return Err(too_long);
        }

        self.rest = input[consumed..].trim_start_matches(' ');
        Ok(token)
    }

    /// Reads a key. Keys must be printable: control characters are refused.
    pub fn next_key(&mut self) -> ParseResult<String> {
        self.next_name(MAX_KEY_LEN)
    }

    /// Reads a hash field, under the same rules as a key.
    pub fn next_field(&mut self) -> ParseResult<String> {
        self.next_name(MAX_FIELD_LEN)
    }

    fn next_name(&mut self, limit: usize) -> ParseResult<String> {
        let before = self.rest;
        let token = self.next_token(limit, ParseError::KeyTooLong)?;
        if token.chars().any(char::is_control) {
            self.rest = before;
            return Err(ParseError::Syntax);
        }
        Ok(token)
    }

    pub fn next_value(&mut self) -> ParseResult<String> {
        self.next_token(MAX_VALUE_LEN, ParseError::ValueTooLong)
    }

    /// Succeeds only if every token has been consumed.
    pub fn finish(&self) -> ParseResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Syntax)
        }
    }
}

/// Scans a quoted token body (after the opening quote).
///
/// Returns the unescaped token and the number of bytes consumed including
/// the closing quote.
fn unquote(body: &str) -> ParseResult<(String, usize)> {
    let mut token = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((token, i + 1)),
            '\\' if body[i + 1..].starts_with('"') => {
                token.push('"');
                chars.next();
            }
            c if is_line_break(c) => break,
            c => token.push(c),
        }
    }

    Err(ParseError::Syntax)
}

/// Renders an argument so that [`Cursor::next_token`] reads it back
/// unchanged.
///
/// Arguments with spaces or quotes (and the empty string) are wrapped in
/// quotes with embedded quotes escaped; anything else is passed through.
/// An argument that needs quoting and ends in a backslash cannot be
/// represented.
pub fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '"']) {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A classified request with a cursor over its arguments.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub command: Command,
    pub args: Cursor<'a>,
}

impl<'a> Request<'a> {
    pub fn parse(line: &'a str) -> Self {
        let (command, rest) = parse_command(line);
        Self {
            command,
            args: Cursor::new(rest),
        }
    }
}
