//! Core Storage Engine
//!
//! This is the single piece of state shared by every connection. It maps keys
//! to typed entries: a plain string, or a hash (a one-level field map).
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        StorageEngine                           │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐        ┌──────────┐    │
//! │  │ bucket 0 │ │ bucket 1 │ │ bucket 2 │  ...   │bucket 255│    │
//! │  │  RwLock  │ │  RwLock  │ │  RwLock  │        │  RwLock  │    │
//! │  └────┬─────┘ └──────────┘ └────┬─────┘        └──────────┘    │
//! │       ▼                         ▼                              │
//! │   "name" = String          "user:1" = Hash ─┐                  │
//! │       ▼                                     ▼                  │
//! │   "count" = String          16 field buckets, same chain type  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every read and write of a chain, and of the field map owned by an entry in
//! that chain, happens under that bucket's lock. Operations on keys in
//! different buckets proceed in parallel.
//!
//! ## Bounds
//!
//! Keys and fields are at most [`MAX_KEY_LEN`] bytes and values at most
//! [`MAX_VALUE_LEN`] bytes. Oversized input is rejected, never truncated.

use crate::storage::chain::{bucket_index, Chain};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Number of buckets in the key table. Fixed for the lifetime of the engine.
pub const NUM_BUCKETS: usize = 256;

/// Number of buckets in each hash entry's field map.
pub const FIELD_BUCKETS: usize = 16;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 32;

/// Maximum field length in bytes.
pub const MAX_FIELD_LEN: usize = MAX_KEY_LEN;

/// Maximum value length in bytes.
pub const MAX_VALUE_LEN: usize = 128;

/// Errors returned by store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("key too long")]
    KeyTooLong,

    #[error("value too long")]
    ValueTooLong,

    #[error("not found")]
    NotFound,

    /// The key exists with the other entry type, or a hash field holds a
    /// non-numeric value where a number was expected.
    #[error("wrong type")]
    TypeMismatch,

    /// A bucket lock was poisoned by a panicking writer.
    #[error("internal error")]
    Internal,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The type of an entry, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    String,
    Hash,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::String => "string",
            EntryType::Hash => "hash",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The field map owned by a hash entry.
///
/// Uses the same bucket/chain layout as the key table, one level down.
#[derive(Debug, Clone)]
pub struct HashValue {
    buckets: Vec<Chain<String>>,
}

impl Default for HashValue {
    fn default() -> Self {
        Self::new()
    }
}

impl HashValue {
    pub fn new() -> Self {
        Self {
            buckets: (0..FIELD_BUCKETS).map(|_| Chain::new()).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.buckets[bucket_index(field, FIELD_BUCKETS)]
            .get(field)
            .map(String::as_str)
    }

    /// Upserts a field. Returns `true` if the field was newly created.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        self.buckets[bucket_index(field, FIELD_BUCKETS)]
            .upsert(field, value)
            .is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|(f, v)| (f, v.as_str())))
    }

    fn payload_bytes(&self) -> usize {
        self.iter().map(|(f, v)| f.len() + v.len()).sum()
    }
}

/// A stored entry.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Hash(HashValue),
}

impl Value {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Value::String(_) => EntryType::String,
            Value::Hash(_) => EntryType::Hash,
        }
    }

    fn payload_bytes(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Hash(h) => h.payload_bytes(),
        }
    }
}

/// Formats a number the way `HINCRBY` stores and returns it.
pub fn format_number(n: f64) -> String {
    n.to_string()
}

fn check_key(key: &str) -> StoreResult<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::KeyTooLong);
    }
    Ok(())
}

fn check_field(field: &str) -> StoreResult<()> {
    if field.len() > MAX_FIELD_LEN {
        return Err(StoreError::KeyTooLong);
    }
    Ok(())
}

fn check_value(value: &str) -> StoreResult<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(StoreError::ValueTooLong);
    }
    Ok(())
}

/// The storage engine.
///
/// Wrap it in an `Arc` and share it across connection tasks; every method
/// takes `&self` and synchronizes internally.
///
/// # Example
///
/// ```
/// use linekv::storage::{EntryType, StorageEngine};
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", "Ada").unwrap();
/// assert_eq!(engine.get("name").as_deref(), Some("Ada"));
///
/// engine.hset("user:1", "visits", "1").unwrap();
/// assert_eq!(engine.hincrby("user:1", "visits", 2.0), Ok(3.0));
/// assert_eq!(engine.get_type("user:1"), Some(EntryType::Hash));
/// ```
pub struct StorageEngine {
    buckets: Box<[RwLock<Chain<Value>>]>,

    /// Number of live keys, updated under the owning bucket's write lock
    key_count: AtomicUsize,
}

impl fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEngine")
            .field("buckets", &self.buckets.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty engine with [`NUM_BUCKETS`] buckets.
    pub fn new() -> Self {
        let buckets = (0..NUM_BUCKETS)
            .map(|_| RwLock::new(Chain::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buckets,
            key_count: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn bucket(&self, key: &str) -> &RwLock<Chain<Value>> {
        &self.buckets[bucket_index(key, self.buckets.len())]
    }

    /// Read access never fails: a poisoned chain is still structurally valid.
    fn read(&self, key: &str) -> RwLockReadGuard<'_, Chain<Value>> {
        self.bucket(key)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, key: &str) -> StoreResult<RwLockWriteGuard<'_, Chain<Value>>> {
        self.bucket(key).write().map_err(|_| StoreError::Internal)
    }

    /// Stores a string value, overwriting any previous string.
    ///
    /// Fails with [`StoreError::TypeMismatch`] if `key` holds a hash.
    pub fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        check_key(key)?;
        check_value(value)?;

        let mut chain = self.write(key)?;
        match chain.get_mut(key) {
            Some(Value::String(current)) => {
                current.clear();
                current.push_str(value);
            }
            Some(Value::Hash(_)) => return Err(StoreError::TypeMismatch),
            None => {
                chain.push_front(key.to_string(), Value::String(value.to_string()));
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reads a string value.
    ///
    /// Returns `None` if the key is absent or holds a hash.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.read(key).get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Hash(_) => None,
        }
    }

    /// Removes a key of either type, along with all fields of a hash.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let mut chain = self.write(key)?;
        match chain.remove(key) {
            Some(_) => {
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    /// Upserts one field, creating the hash if the key is absent.
    ///
    /// Returns `true` if the field was newly created.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        check_key(key)?;
        check_field(field)?;
        check_value(value)?;

        let mut chain = self.write(key)?;
        let hash = self.hash_entry(&mut chain, key)?;
        Ok(hash.set(field, value.to_string()))
    }

    /// Upserts several fields of one hash under a single lock acquisition.
    ///
    /// Either every pair is written or, on a validation or type error, none
    /// is. Returns the number of pairs written.
    pub fn hset_multiple(&self, key: &str, pairs: &[(String, String)]) -> StoreResult<usize> {
        check_key(key)?;
        for (field, value) in pairs {
            check_field(field)?;
            check_value(value)?;
        }

        let mut chain = self.write(key)?;
        let hash = self.hash_entry(&mut chain, key)?;
        for (field, value) in pairs {
            hash.set(field, value.clone());
        }
        Ok(pairs.len())
    }

    /// Reads one field of a hash.
    ///
    /// Returns `None` if the key is absent, holds a string, or lacks the field.
    pub fn hget(&self, key: &str, field: &str) -> Option<String> {
        match self.read(key).get(key)? {
            Value::Hash(hash) => hash.get(field).map(str::to_string),
            Value::String(_) => None,
        }
    }

    /// Reads several fields of one hash under a single lock acquisition.
    pub fn hget_multiple(&self, key: &str, fields: &[String]) -> Vec<Option<String>> {
        let chain = self.read(key);
        match chain.get(key) {
            Some(Value::Hash(hash)) => fields
                .iter()
                .map(|f| hash.get(f).map(str::to_string))
                .collect(),
            _ => vec![None; fields.len()],
        }
    }

    /// Adds `delta` to a numeric field and returns the new value.
    ///
    /// A missing key or field starts from zero, so the first call stores
    /// `delta` itself.
    pub fn hincrby(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        check_key(key)?;
        check_field(field)?;

        let mut chain = self.write(key)?;

        let current = match chain.get(key) {
            Some(Value::String(_)) => return Err(StoreError::TypeMismatch),
            Some(Value::Hash(hash)) => match hash.get(field) {
                Some(text) => match text.trim().parse::<f64>() {
                    Ok(n) if n.is_finite() => n,
                    _ => return Err(StoreError::TypeMismatch),
                },
                None => 0.0,
            },
            None => 0.0,
        };

        // Overflow to infinity is reported like any other oversized result
        let updated = current + delta;
        if !updated.is_finite() {
            return Err(StoreError::ValueTooLong);
        }
        let formatted = format_number(updated);
        check_value(&formatted)?;

        self.hash_entry(&mut chain, key)?.set(field, formatted);
        Ok(updated)
    }

    /// Returns the hash stored under `key`, creating an empty one if absent.
    ///
    /// Must be called with the key's bucket write-locked.
    fn hash_entry<'a>(
        &self,
        chain: &'a mut Chain<Value>,
        key: &str,
    ) -> StoreResult<&'a mut HashValue> {
        if chain.get(key).is_none() {
            chain.push_front(key.to_string(), Value::Hash(HashValue::new()));
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        match chain.get_mut(key) {
            Some(Value::Hash(hash)) => Ok(hash),
            Some(Value::String(_)) => Err(StoreError::TypeMismatch),
            None => Err(StoreError::Internal),
        }
    }

    /// Reports the type of the entry under `key`.
    pub fn get_type(&self, key: &str) -> Option<EntryType> {
        self.read(key).get(key).map(Value::entry_type)
    }

    /// Returns the number of keys in the store.
    pub fn count_keys(&self) -> usize {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Approximate payload footprint in bytes: the sum of all key, field
    /// and value lengths.
    pub fn memory_usage(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| {
                let chain = bucket.read().unwrap_or_else(PoisonError::into_inner);
                chain
                    .iter()
                    .map(|(key, value)| key.len() + value.payload_bytes())
                    .sum::<usize>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        engine.set("key", "value").unwrap();
        assert_eq!(engine.get("key"), Some("value".to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get("nonexistent"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let engine = StorageEngine::new();

        engine.set("key", "v1").unwrap();
        engine.set("key", "v2").unwrap();
        assert_eq!(engine.get("key"), Some("v2".to_string()));
        assert_eq!(engine.count_keys(), 1);
    }

    #[test]
    fn test_delete() {
        let engine = StorageEngine::new();

        engine.set("key", "value").unwrap();
        assert_eq!(engine.delete("key"), Ok(()));
        assert_eq!(engine.get("key"), None);
        assert_eq!(engine.delete("key"), Err(StoreError::NotFound));
        assert_eq!(engine.count_keys(), 0);
    }

    #[test]
    fn test_delete_hash_releases_fields() {
        let engine = StorageEngine::new();

        engine.hset("h", "a", "1").unwrap();
        engine.hset("h", "b", "2").unwrap();
        engine.delete("h").unwrap();

        assert_eq!(engine.get_type("h"), None);
        assert_eq!(engine.hget("h", "a"), None);

        // Recreating under the other type is allowed after deletion
        engine.set("h", "plain").unwrap();
        assert_eq!(engine.get_type("h"), Some(EntryType::String));
    }

    #[test]
    fn test_bounds_are_rejected_not_truncated() {
        let engine = StorageEngine::new();
        let long_key = "k".repeat(MAX_KEY_LEN + 1);
        let long_value = "v".repeat(MAX_VALUE_LEN + 1);

        assert_eq!(engine.set(&long_key, "v"), Err(StoreError::KeyTooLong));
        assert_eq!(engine.set("k", &long_value), Err(StoreError::ValueTooLong));
        assert_eq!(
            engine.hset("h", &long_key, "v"),
            Err(StoreError::KeyTooLong)
        );
        assert_eq!(engine.count_keys(), 0);

        // Exactly at the bound is fine
        let key = "k".repeat(MAX_KEY_LEN);
        let value = "v".repeat(MAX_VALUE_LEN);
        engine.set(&key, &value).unwrap();
        assert_eq!(engine.get(&key), Some(value));
    }

    #[test]
    fn test_hset_upserts_field() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hset("h", "f", "v1"), Ok(true));
        assert_eq!(engine.hset("h", "f", "v2"), Ok(false));
        assert_eq!(engine.hget("h", "f"), Some("v2".to_string()));
        assert_eq!(engine.hget("h", "missing"), None);
    }

    #[test]
    fn test_type_safety() {
        let engine = StorageEngine::new();

        engine.set("s", "x").unwrap();
        engine.hset("h", "f", "x").unwrap();

        assert_eq!(engine.hget("s", "anything"), None);
        assert_eq!(engine.get("h"), None);

        assert_eq!(engine.set("h", "y"), Err(StoreError::TypeMismatch));
        assert_eq!(engine.hset("s", "f", "y"), Err(StoreError::TypeMismatch));
        assert_eq!(
            engine.hincrby("s", "f", 1.0),
            Err(StoreError::TypeMismatch)
        );

        // Failed writes leave no trace
        assert_eq!(engine.get("s"), Some("x".to_string()));
        assert_eq!(engine.hget("h", "f"), Some("x".to_string()));
    }

    #[test]
    fn test_hset_multiple_is_all_or_nothing() {
        let engine = StorageEngine::new();
        let long_value = "v".repeat(MAX_VALUE_LEN + 1);

        let pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), long_value),
        ];
        assert_eq!(
            engine.hset_multiple("h", &pairs),
            Err(StoreError::ValueTooLong)
        );
        assert_eq!(engine.get_type("h"), None);

        let pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert_eq!(engine.hset_multiple("h", &pairs), Ok(2));
        assert_eq!(
            engine.hget_multiple("h", &["b".to_string(), "c".to_string()]),
            vec![Some("2".to_string()), None]
        );
    }

    #[test]
    fn test_hincrby_accumulates() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hincrby("h", "c", 5.0), Ok(5.0));
        assert_eq!(engine.hincrby("h", "c", 3.0), Ok(8.0));
        assert_eq!(engine.hget("h", "c"), Some("8".to_string()));

        engine.hincrby("h", "f", 0.1).unwrap();
        let total = engine.hincrby("h", "f", 0.2).unwrap();
        assert!((total - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_hincrby_on_non_numeric_field() {
        let engine = StorageEngine::new();

        engine.hset("h", "name", "ada").unwrap();
        assert_eq!(
            engine.hincrby("h", "name", 1.0),
            Err(StoreError::TypeMismatch)
        );
        assert_eq!(engine.hget("h", "name"), Some("ada".to_string()));
    }

    #[test]
    fn test_hincrby_result_must_fit() {
        let engine = StorageEngine::new();

        // f64 display never uses an exponent, so 1e200 is 201 characters
        assert_eq!(
            engine.hincrby("h", "big", 1e200),
            Err(StoreError::ValueTooLong)
        );
        assert_eq!(engine.hget("h", "big"), None);
        assert_eq!(engine.get_type("h"), None);
    }

    #[test]
    fn test_hincrby_stays_finite() {
        let engine = StorageEngine::new();

        // Stored text that parses to a non-finite number is not a counter
        engine.hset("h", "n", "NaN").unwrap();
        engine.hset("h", "i", "inf").unwrap();
        assert_eq!(engine.hincrby("h", "n", 1.0), Err(StoreError::TypeMismatch));
        assert_eq!(engine.hincrby("h", "i", 1.0), Err(StoreError::TypeMismatch));

        // A sum that overflows is rejected and the field keeps its value
        engine.hset("h", "big", "1e308").unwrap();
        assert_eq!(
            engine.hincrby("h", "big", 1e308),
            Err(StoreError::ValueTooLong)
        );
        assert_eq!(engine.hget("h", "big"), Some("1e308".to_string()));
    }

    #[test]
    fn test_get_type_and_count() {
        let engine = StorageEngine::new();

        assert_eq!(engine.get_type("missing"), None);
        engine.set("s", "1").unwrap();
        engine.hset("h", "f", "1").unwrap();

        assert_eq!(engine.get_type("s"), Some(EntryType::String));
        assert_eq!(engine.get_type("h"), Some(EntryType::Hash));
        assert_eq!(engine.count_keys(), 2);
        assert_eq!(EntryType::Hash.to_string(), "hash");
    }

    #[test]
    fn test_memory_usage() {
        let engine = StorageEngine::new();
        assert_eq!(engine.memory_usage(), 0);

        engine.set("ab", "cde").unwrap(); // 2 + 3
        engine.hset("h", "f", "vv").unwrap(); // 1 + 1 + 2
        assert_eq!(engine.memory_usage(), 9);
    }

    #[test]
    fn test_many_keys_share_buckets() {
        let engine = StorageEngine::new();

        // More keys than buckets forces chaining
        for i in 0..(NUM_BUCKETS * 4) {
            engine.set(&format!("key:{}", i), &i.to_string()).unwrap();
        }
        assert_eq!(engine.count_keys(), NUM_BUCKETS * 4);

        for i in (0..(NUM_BUCKETS * 4)).step_by(2) {
            engine.delete(&format!("key:{}", i)).unwrap();
        }
        assert_eq!(engine.count_keys(), NUM_BUCKETS * 2);
        assert_eq!(engine.get("key:1"), Some("1".to_string()));
        assert_eq!(engine.get("key:2"), None);
    }

    #[test]
    fn test_concurrent_disjoint_writers() {
        const THREADS: usize = 8;
        const OPS: usize = 1000;

        let engine = Arc::new(StorageEngine::new());

        std::thread::scope(|s| {
            for t in 0..THREADS {
                let engine = Arc::clone(&engine);
                s.spawn(move || {
                    for i in 0..OPS {
                        let key = format!("t{}:k{}", t, i);
                        let value = format!("v{}", i);
                        engine.set(&key, &value).unwrap();
                        assert_eq!(engine.get(&key), Some(value));
                    }
                });
            }
        });

        assert_eq!(engine.count_keys(), THREADS * OPS);
    }

    #[test]
    fn test_concurrent_hincrby_same_field() {
        const THREADS: usize = 4;
        const OPS: usize = 500;

        let engine = StorageEngine::new();

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..OPS {
                        engine.hincrby("counter", "n", 1.0).unwrap();
                    }
                });
            }
        });

        assert_eq!(
            engine.hget("counter", "n"),
            Some((THREADS * OPS).to_string())
        );
    }
}
