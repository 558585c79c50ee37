//! Command Handler
//!
//! Takes one classified request, pulls its arguments off the cursor, runs it
//! against the storage engine and builds the framed response.
//!
//! ## Commands
//!
//! | Command | Reply |
//! |---|---|
//! | `PING` | `PONG` |
//! | `TIME` | local time, e.g. `Mon Oct 19 12:00:00 2026` |
//! | `INFO` | multi: uptime, memory, key count, version |
//! | `GOODBYE` | `Goodbye!`, then the connection is closed |
//! | `SET key value` | `OK` |
//! | `GET key` | the value, or `ERROR not found` |
//! | `DEL key` | `DELETED`, or `ERROR not found` |
//! | `MSET k1 v1 [k2 v2 ...]` | `OK`; pairs are applied in order up to the first failure |
//! | `MGET k1 [k2 ...]` | multi, `(nil)` per miss |
//! | `TYPE key` | `"string"`, `"hash"` or `(nil)` |
//! | `HSET key f1 v1 [f2 v2 ...]` | number of fields written |
//! | `HGET key field` | the value or `(nil)` |
//! | `HMGET key f1 [f2 ...]` | multi, `(nil)` per miss |
//! | `HINCRBY key field delta` | the new value |
//!
//! A failing command produces an `ERROR` response and never affects the
//! connection itself.

use crate::protocol::{Command, Cursor, ErrorReply, ParseError, Request, Response};
use crate::storage::{format_number, StorageEngine};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// `ctime`-style layout used by `TIME`
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

type CommandResult = Result<Response, ErrorReply>;

/// Executes requests against a shared storage engine.
///
/// Cheap to clone: every clone shares the same engine and start time.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Server start time for INFO
    start_time: Instant,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            start_time: Instant::now(),
        }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Parses and executes one request line.
    pub fn execute(&self, line: &str) -> Response {
        self.execute_request(Request::parse(line))
    }

    /// Executes an already classified request.
    pub fn execute_request(&self, request: Request<'_>) -> Response {
        let Request { command, mut args } = request;
        trace!(command = %command, "Executing command");

        self.dispatch(command, &mut args)
            .unwrap_or_else(Response::Error)
    }

    /// Routes a command to its handler.
    fn dispatch(&self, command: Command, args: &mut Cursor<'_>) -> CommandResult {
        match command {
            Command::Ping => self.cmd_ping(),
            Command::Time => self.cmd_time(),
            Command::Info => self.cmd_info(),
            Command::Goodbye => self.cmd_goodbye(),

            // String commands
            Command::Set => self.cmd_set(args),
            Command::Get => self.cmd_get(args),
            Command::Del => self.cmd_del(args),
            Command::Mset => self.cmd_mset(args),
            Command::Mget => self.cmd_mget(args),
            Command::Type => self.cmd_type(args),

            // Hash commands
            Command::Hset => self.cmd_hset(args),
            Command::Hget => self.cmd_hget(args),
            Command::Hmget => self.cmd_hmget(args),
            Command::Hincrby => self.cmd_hincrby(args),

            Command::Unknown => Err(ErrorReply::UnknownCommand),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING
    fn cmd_ping(&self) -> CommandResult {
        Ok(Response::pong())
    }

    /// TIME
    fn cmd_time(&self) -> CommandResult {
        let now = chrono::Local::now();
        Ok(Response::single(now.format(TIME_FORMAT).to_string()))
    }

    /// INFO
    fn cmd_info(&self) -> CommandResult {
        Ok(Response::multi(vec![
            Some(format!("uptime_seconds:{}", self.start_time.elapsed().as_secs())),
            Some(format!("used_memory:{}", self.storage.memory_usage())),
            Some(format!("keys:{}", self.storage.count_keys())),
            Some(format!("version:{}", crate::VERSION)),
        ]))
    }

    /// GOODBYE
    fn cmd_goodbye(&self) -> CommandResult {
        Ok(Response::single("Goodbye!"))
    }

    // ========================================================================
    // String Commands
    // ========================================================================

    /// SET key value
    fn cmd_set(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        let value = args.next_value()?;
        args.finish()?;

        self.storage.set(&key, &value)?;
        Ok(Response::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        args.finish()?;

        self.storage
            .get(&key)
            .map(Response::single)
            .ok_or(ErrorReply::NotFound)
    }

    /// DEL key
    fn cmd_del(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        args.finish()?;

        self.storage.delete(&key)?;
        Ok(Response::single("DELETED"))
    }

    /// MSET key value [key value ...]
    fn cmd_mset(&self, args: &mut Cursor<'_>) -> CommandResult {
        if args.is_empty() {
            return Err(ParseError::Syntax.into());
        }

        // Each pair is parsed and applied before the next is read
        while !args.is_empty() {
            let key = args.next_key()?;
            let value = args.next_value()?;
            self.storage.set(&key, &value)?;
        }
        Ok(Response::ok())
    }

    /// MGET key [key ...]
    fn cmd_mget(&self, args: &mut Cursor<'_>) -> CommandResult {
        let keys = collect_tokens(args, Cursor::next_key)?;

        let values = keys.iter().map(|key| self.storage.get(key)).collect();
        Ok(Response::multi(values))
    }

    /// TYPE key
    fn cmd_type(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        args.finish()?;

        Ok(match self.storage.get_type(&key) {
            Some(entry_type) => Response::single(format!("\"{}\"", entry_type)),
            None => Response::nil(),
        })
    }

    // ========================================================================
    // Hash Commands
    // ========================================================================

    /// HSET key field value [field value ...]
    fn cmd_hset(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        if args.is_empty() {
            return Err(ParseError::Syntax.into());
        }

        let mut pairs = Vec::new();
        while !args.is_empty() {
            let field = args.next_field()?;
            let value = args.next_value()?;
            pairs.push((field, value));
        }

        let written = self.storage.hset_multiple(&key, &pairs)?;
        Ok(Response::single(written.to_string()))
    }

    /// HGET key field
    fn cmd_hget(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        let field = args.next_field()?;
        args.finish()?;

        Ok(match self.storage.hget(&key, &field) {
            Some(value) => Response::single(value),
            None => Response::nil(),
        })
    }

    /// HMGET key field [field ...]
    fn cmd_hmget(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        let fields = collect_tokens(args, Cursor::next_field)?;

        Ok(Response::multi(self.storage.hget_multiple(&key, &fields)))
    }

    /// HINCRBY key field delta
    fn cmd_hincrby(&self, args: &mut Cursor<'_>) -> CommandResult {
        let key = args.next_key()?;
        let field = args.next_field()?;
        let delta = parse_number(&args.next_value()?)?;
        args.finish()?;

        let updated = self.storage.hincrby(&key, &field, delta)?;
        Ok(Response::single(format_number(updated)))
    }
}

/// Reads tokens until the line is exhausted. At least one is required.
fn collect_tokens<'a, F>(args: &mut Cursor<'a>, mut next: F) -> Result<Vec<String>, ParseError>
where
    F: FnMut(&mut Cursor<'a>) -> Result<String, ParseError>,
{
    let mut tokens = Vec::new();
    while !args.is_empty() {
        tokens.push(next(args)?);
    }
    if tokens.is_empty() {
        return Err(ParseError::Syntax);
    }
    Ok(tokens)
}

/// Parses a finite floating-point number.
fn parse_number(text: &str) -> Result<f64, ParseError> {
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(ParseError::Syntax),
    }
}
