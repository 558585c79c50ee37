//! Line Protocol Implementation
//!
//! Requests are single newline-terminated text lines; responses are framed
//! in a `RESPONSE <KIND>` / `END` envelope.
//!
//! ## Modules
//!
//! - `parser`: command classification and argument tokenizing
//! - `types`: the `Response` envelope and the fixed error replies
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{Command, Request, Response};
//!
//! let req = Request::parse("GET name\n");
//! assert_eq!(req.command, Command::Get);
//!
//! let bytes = Response::single("Ada").serialize();
//! assert_eq!(bytes, b"RESPONSE OK STRING\nAda\nEND\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, quote, Command, Cursor, ParseError, ParseResult, Request};
pub use types::{ErrorReply, Response};
