//! Command Handler Module
//!
//! Maps each recognized command to its handler, runs it against the storage
//! engine, and returns the framed response.
//!
//! ## Architecture
//!
//! ```text
//! Request line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request parser  │  (protocol module)
//! └────────┬────────┘
//!          │ Command + Cursor
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Server: `PING`, `TIME`, `INFO`, `GOODBYE`
//! - Strings: `SET`, `GET`, `DEL`, `MSET`, `MGET`, `TYPE`
//! - Hashes: `HSET`, `HGET`, `HMGET`, `HINCRBY`

pub mod handler;

pub use handler::CommandHandler;
