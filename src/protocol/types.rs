//! Response Framing
//!
//! Every reply is wrapped in an envelope that announces its kind:
//!
//! ```text
//! RESPONSE <KIND>\n
//! <body line>\n
//! ...
//! END\n
//! ```
//!
//! `<KIND>` is one of:
//! - `OK STRING`: exactly one body line carrying the payload
//! - `OK MULTI`: one `N) value` or `N) (nil)` line per item, 1-indexed
//! - `ERROR`: one body line carrying a fixed error text
//!
//! ## Examples
//!
//! ```text
//! RESPONSE OK STRING      RESPONSE OK MULTI      RESPONSE ERROR
//! PONG                    1) v1                  ERROR not found
//! END                     2) (nil)               END
//!                         END
//! ```

use crate::protocol::parser::ParseError;
use crate::storage::StoreError;
use std::fmt;

/// Header prefix of every response
pub const HEADER: &str = "RESPONSE";

/// Final line of every response
pub const FOOTER: &str = "END";

/// Marker for a missing value
pub const NIL: &str = "(nil)";

/// The fixed error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReply {
    KeyTooLong,
    ValueTooLong,
    NotFound,
    ParseError,
    UnknownCommand,
    WrongType,
    Internal,
}

impl ErrorReply {
    /// The body line sent for this error.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorReply::KeyTooLong => "ERROR key too long",
            ErrorReply::ValueTooLong => "ERROR value too long",
            ErrorReply::NotFound => "ERROR not found",
            ErrorReply::ParseError => "ERROR parse error",
            ErrorReply::UnknownCommand => "ERROR unknown command",
            ErrorReply::WrongType => "ERROR wrong type",
            ErrorReply::Internal => "ERROR internal error",
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<StoreError> for ErrorReply {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyTooLong => ErrorReply::KeyTooLong,
            StoreError::ValueTooLong => ErrorReply::ValueTooLong,
            StoreError::NotFound => ErrorReply::NotFound,
            StoreError::TypeMismatch => ErrorReply::WrongType,
            StoreError::Internal => ErrorReply::Internal,
        }
    }
}

impl From<ParseError> for ErrorReply {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Syntax => ErrorReply::ParseError,
            ParseError::KeyTooLong => ErrorReply::KeyTooLong,
            ParseError::ValueTooLong => ErrorReply::ValueTooLong,
        }
    }
}

/// A reply to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `OK STRING` with a single payload line
    Single(String),

    /// `OK MULTI` with one indexed line per item; `None` renders as `(nil)`
    Multi(Vec<Option<String>>),

    /// `ERROR` with one fixed message
    Error(ErrorReply),
}

impl Response {
    /// Creates a single-line response.
    pub fn single(s: impl Into<String>) -> Self {
        Response::Single(s.into())
    }

    /// Creates a multi-value response.
    pub fn multi(items: Vec<Option<String>>) -> Self {
        Response::Multi(items)
    }

    pub fn error(reply: ErrorReply) -> Self {
        Response::Error(reply)
    }

    pub fn ok() -> Self {
        Response::single("OK")
    }

    pub fn pong() -> Self {
        Response::single("PONG")
    }

    pub fn nil() -> Self {
        Response::single(NIL)
    }

    /// The `<KIND>` part of the header line.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Single(_) => "OK STRING",
            Response::Multi(_) => "OK MULTI",
            Response::Error(_) => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Serializes the framed response to bytes for the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the framed response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        push_line(buf, &format!("{} {}", HEADER, self.kind()));

        match self {
            Response::Single(s) => push_line(buf, s),
            Response::Multi(items) => {
                for (i, item) in items.iter().enumerate() {
                    let line = format!("{}) {}", i + 1, item.as_deref().unwrap_or(NIL));
                    push_line(buf, &line);
                }
            }
            Response::Error(reply) => push_line(buf, reply.message()),
        }

        push_line(buf, FOOTER);
    }
}

impl From<ErrorReply> for Response {
    fn from(reply: ErrorReply) -> Self {
        Response::Error(reply)
    }
}

impl From<StoreError> for Response {
    fn from(err: StoreError) -> Self {
        Response::Error(err.into())
    }
}

impl From<ParseError> for Response {
    fn from(err: ParseError) -> Self {
        Response::Error(err.into())
    }
}

#[inline]
fn push_line(buf: &mut Vec<u8>, line: &str) {
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_serialize() {
        let value = Response::single("bar");
        assert_eq!(value.serialize(), b"RESPONSE OK STRING\nbar\nEND\n");
    }

    #[test]
    fn test_ok_and_pong() {
        assert_eq!(Response::ok().serialize(), b"RESPONSE OK STRING\nOK\nEND\n");
        assert_eq!(
            Response::pong().serialize(),
            b"RESPONSE OK STRING\nPONG\nEND\n"
        );
    }

    #[test]
    fn test_multi_serialize() {
        let value = Response::multi(vec![Some("v1".to_string()), None, Some("v3".to_string())]);
        assert_eq!(
            value.serialize(),
            b"RESPONSE OK MULTI\n1) v1\n2) (nil)\n3) v3\nEND\n"
        );
    }

    #[test]
    fn test_empty_multi_serialize() {
        assert_eq!(
            Response::multi(vec![]).serialize(),
            b"RESPONSE OK MULTI\nEND\n"
        );
    }

    #[test]
    fn test_error_serialize() {
        let value = Response::error(ErrorReply::UnknownCommand);
        assert_eq!(
            value.serialize(),
            b"RESPONSE ERROR\nERROR unknown command\nEND\n"
        );
        assert!(value.is_error());
    }

    #[test]
    fn test_error_texts() {
        let cases = [
            (ErrorReply::KeyTooLong, "ERROR key too long"),
            (ErrorReply::ValueTooLong, "ERROR value too long"),
            (ErrorReply::NotFound, "ERROR not found"),
            (ErrorReply::ParseError, "ERROR parse error"),
            (ErrorReply::UnknownCommand, "ERROR unknown command"),
            (ErrorReply::Internal, "ERROR internal error"),
        ];
        for (reply, text) in cases {
            assert_eq!(reply.to_string(), text);
        }
    }

    #[test]
    fn test_error_conversions() {
        assert_eq!(
            Response::from(StoreError::TypeMismatch),
            Response::Error(ErrorReply::WrongType)
        );
        assert_eq!(
            Response::from(ParseError::ValueTooLong),
            Response::Error(ErrorReply::ValueTooLong)
        );
        assert_eq!(
            Response::from(ParseError::Syntax),
            Response::Error(ErrorReply::ParseError)
        );
    }
}
