//! # linekv - An In-Memory Key-Value Store with a Line Protocol
//!
//! linekv keeps string and hash entries in memory and serves them to many
//! concurrent clients over a plain-text, newline-delimited TCP protocol.
//!
//! ## Features
//!
//! - **Two entry types**: plain strings and hashes of field/value pairs
//! - **Human-readable protocol**: one request per line, quoted arguments,
//!   responses framed by `RESPONSE ...` / `END`
//! - **Concurrent access**: every bucket of the table has its own `RwLock`
//! - **Async I/O**: built on Tokio, one task per client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                 │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ Accept loop │───>│ Connection  │───>│  Command    │              │
//! │  │  (server)   │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘              │
//! │                                               │                     │
//! │                                               ▼                     │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────┐    │
//! │  │  Request    │    │              StorageEngine               │    │
//! │  │  Parser     │    │  ┌────────┐ ┌────────┐ ┌────────┐        │    │
//! │  │             │    │  │Bucket 0│ │Bucket 1│ │ ...255 │        │    │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │        │    │
//! │                     │  └────────┘ └────────┘ └────────┘        │    │
//! │                     └──────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::commands::CommandHandler;
//! use linekv::connection::ConnectionStats;
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let listener = TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     linekv::server::serve(listener, handler, stats, shutdown_rx).await;
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parsing and response framing
//! - [`storage`]: the bucketed, thread-safe entry table
//! - [`commands`]: command dispatch and execution
//! - [`connection`]: per-client line framing and I/O
//! - [`server`]: the accept loop and shutdown
//! - [`config`]: host and port settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::CommandHandler;
pub use config::{Action, Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ErrorReply, ParseError, Request, Response};
pub use storage::{StorageEngine, StoreError};

/// The default port linekv listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host linekv binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
