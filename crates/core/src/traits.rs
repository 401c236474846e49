//! Core traits for datastore abstraction
//!
//! This module defines the adapter contract every backend implements
//! ([`Datastore`] and its key encoding half, [`KeyCodec`]) and the opaque key
//! generator adapters use when creating records.
//!
//! Adapters receive records that are already packed (storage field names,
//! storage representations) and return records in the same shape; the
//! session unpacks them.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::error::Result;
use crate::query::Query;
use crate::record::Record;
use crate::value::Value;

/// Backend-specific key encoding
///
/// Used by the foreign-key type to store references to records of another
/// kind in the form the backend understands.
pub trait KeyCodec {
    /// Encode a record key of `kind` for storage inside another record
    fn pack_key(&self, kind: &str, key: &Value) -> Result<Value>;

    /// Decode a stored reference back into a record key of `kind`
    fn unpack_key(&self, kind: &str, key: &Value) -> Result<Value>;
}

/// The contract every storage backend satisfies
///
/// | Operation | Contract |
/// |-----------|----------|
/// | `save` | per record: create if new (no key), else update |
/// | `create` | always creates; a caller-supplied key is honored |
/// | `find_by_key` | `None` if absent (not an error) |
/// | `find` | matches filters, ordered by sorts, offset then limited |
/// | `delete_by_key` | idempotent |
/// | `delete` | deletes every matching record |
/// | `count` | cardinality of the matching set, ignoring limit/offset |
///
/// No atomicity across records is promised. Each single-record write must
/// become visible all at once.
pub trait Datastore: KeyCodec + Send + Sync {
    /// Short backend name used in logs and adapter errors
    fn name(&self) -> &'static str;

    /// Create new records, update existing ones
    fn save(&self, records: Vec<Record>) -> Result<Vec<Record>>;

    /// Create every record, generating keys only where none is given
    fn create(&self, records: Vec<Record>) -> Result<Vec<Record>>;

    /// Fetch one record
    fn find_by_key(&self, kind: &str, key: &str) -> Result<Option<Record>>;

    /// Run a query
    fn find(&self, query: &Query) -> Result<Vec<Record>>;

    /// Remove one record; absent keys are not an error
    fn delete_by_key(&self, kind: &str, key: &str) -> Result<()>;

    /// Remove every record the query matches
    fn delete(&self, query: &Query) -> Result<()>;

    /// Count the records the query matches
    fn count(&self, query: &Query) -> Result<u64>;
}

/// Opaque source of new record keys
pub trait KeyGenerator: Send + Sync {
    /// Produce a key never produced before by this generator
    fn generate(&self) -> String;
}

/// Random UUID v4 keys in simple (hyphen-less) form
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Monotonic keys `<prefix><n>`, for deterministic fixtures
#[derive(Debug)]
pub struct SequentialKeyGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialKeyGenerator {
    /// Start counting at 1 with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl KeyGenerator for SequentialKeyGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}
