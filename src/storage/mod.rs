//! Storage Engine Module
//!
//! Owns all key/value state: a fixed-size table of bucket chains holding
//! string entries and hash entries.
//!
//! ## Features
//!
//! - **Typed entries**: a key holds either a string or a field map, and keeps
//!   that type until it is deleted
//! - **Per-bucket RwLock**: readers share a bucket, writers own it, and
//!   different buckets never block each other
//! - **Bounded input**: oversized keys, fields and values are rejected
//!
//! ## Example
//!
//! ```
//! use linekv::storage::{StorageEngine, StoreError};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set("greeting", "hello").unwrap();
//! assert_eq!(engine.get("greeting").as_deref(), Some("hello"));
//!
//! // A string key cannot be used as a hash
//! assert_eq!(
//!     engine.hset("greeting", "field", "x"),
//!     Err(StoreError::TypeMismatch)
//! );
//!
//! engine.delete("greeting").unwrap();
//! assert_eq!(engine.delete("greeting"), Err(StoreError::NotFound));
//! ```

pub mod chain;
pub mod engine;

pub use engine::{
    format_number, EntryType, HashValue, StorageEngine, StoreError, StoreResult, Value,
    MAX_FIELD_LEN, MAX_KEY_LEN, MAX_VALUE_LEN, NUM_BUCKETS,
};
