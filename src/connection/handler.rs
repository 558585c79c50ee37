//! Per-Connection Handler
//!
//! Reads newline-terminated request lines from one client, executes each
//! one and writes the framed response back, in order.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. accept() hands the stream to a new task
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │ read bytes into the buffer   │◄──┐
//!    └──────────────┬───────────────┘   │
//!                   ▼                   │
//!    ┌──────────────────────────────┐   │
//!    │ split off complete lines,    │   │
//!    │ execute, write responses     │───┘
//!    └──────────────┬───────────────┘
//!                   │
//!                   ▼
//! 3. Client disconnects, sends GOODBYE, or I/O fails
//!        │
//!        ▼
//! 4. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream: a read may carry half a request or several. Bytes are
//! accumulated in a `BytesMut` and complete lines are split off the front.
//! A line longer than [`MAX_LINE_LEN`] is answered with a parse error and
//! skipped up to its newline; the connection stays open.

use crate::commands::CommandHandler;
use crate::protocol::{Command, ErrorReply, Request, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Maximum request line length in bytes, excluding the newline
pub const MAX_LINE_LEN: usize = 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// What the framer found at the front of the buffer.
#[derive(Debug)]
enum Frame {
    /// A complete line, without its terminator
    Line(BytesMut),
    /// A line that exceeded [`MAX_LINE_LEN`]
    Oversized,
}

/// Handles a single client connection.
pub struct ConnectionHandler<S> {
    /// The client stream, write side buffered
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Set while skipping the tail of an oversized line
    discarding: bool,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            discarding: false,
            command_handler,
            stats,
        }
    }

    /// Runs the connection until the client leaves or an I/O error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client said goodbye"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    ///
    /// Returns `Ok(())` when the client asked to close the connection.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.next_frame() {
                let close = match frame {
                    Frame::Line(line) => self.process_line(&line).await?,
                    Frame::Oversized => {
                        warn!(client = %self.addr, max = MAX_LINE_LEN, "Request line too long");
                        self.send_response(&Response::error(ErrorReply::ParseError))
                            .await?;
                        false
                    }
                };
                if close {
                    return Ok(());
                }
            }

            if self.read_more_data().await? == 0 {
                // A final request without a newline still gets an answer
                if !self.buffer.is_empty() && !self.discarding {
                    let line = self.buffer.split();
                    self.process_line(&line).await?;
                }
                return Err(ConnectionError::ClientDisconnected);
            }
        }
    }

    /// Splits the next complete line off the buffer.
    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let mut line = self.buffer.split_to(pos + 1);
                    line.truncate(pos);
                    if line.last() == Some(&b'\r') {
                        line.truncate(pos - 1);
                    }

                    if self.discarding {
                        // Tail of an oversized line that was already answered
                        self.discarding = false;
                        continue;
                    }
                    if line.len() > MAX_LINE_LEN {
                        return Some(Frame::Oversized);
                    }
                    return Some(Frame::Line(line));
                }
                None => {
                    // Room for the `\r` of a CRLF terminator still to come
                    let limit = match self.buffer.last() {
                        Some(b'\r') => MAX_LINE_LEN + 1,
                        _ => MAX_LINE_LEN,
                    };
                    if self.buffer.len() > limit {
                        self.buffer.clear();
                        if !self.discarding {
                            self.discarding = true;
                            return Some(Frame::Oversized);
                        }
                    }
                    return None;
                }
            }
        }
    }

    /// Executes one line and sends its response.
    ///
    /// Returns `true` if the connection should be closed afterwards.
    async fn process_line(&mut self, line: &[u8]) -> Result<bool, ConnectionError> {
        self.stats.command_processed();

        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim_end_matches('\r'),
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Request is not valid UTF-8");
                self.send_response(&Response::error(ErrorReply::ParseError))
                    .await?;
                return Ok(false);
            }
        };

        let request = Request::parse(text);
        let close = request.command == Command::Goodbye;
        trace!(client = %self.addr, command = %request.command, "Parsed request");

        let response = self.command_handler.execute_request(request);
        self.send_response(&response).await?;

        Ok(close)
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns the number of bytes read; zero means the peer closed.
    async fn read_more_data(&mut self) -> Result<usize, ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n > 0 {
            self.stats.bytes_read(n);
            trace!(client = %self.addr, bytes = n, "Read data");
        }

        Ok(n)
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            kind = response.kind(),
            "Sent response"
        );
        if response.is_error() {
            debug!(client = %self.addr, "Replied with an error");
        }
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client closed its end of the connection
    #[error("Client disconnected")]
    ClientDisconnected,
}

/// Handles a client connection.
///
/// Creates a `ConnectionHandler` and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
