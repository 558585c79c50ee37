//! Connection Handler Module
//!
//! Each accepted client is served by its own Tokio task, which reads request
//! lines, runs them through the command handler and writes the responses
//! back. Tasks share nothing but the storage engine and the statistics.
//!
//! ## Features
//!
//! - **Line framing**: partial reads and pipelined requests are reassembled
//!   into complete lines
//! - **Bounded lines**: requests over 1024 bytes are rejected without
//!   dropping the connection
//! - **Explicit close**: `GOODBYE` ends the session after its reply
//! - **Statistics**: connection, command and byte counters
//!
//! ## Example
//!
//! ```ignore
//! use linekv::connection::{handle_connection, ConnectionStats};
//! use linekv::commands::CommandHandler;
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), stats.clone()));
//! ```

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, MAX_LINE_LEN,
};
