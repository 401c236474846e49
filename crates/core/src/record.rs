//! Record: an open field → value mapping that always names its kind
//!
//! Two fields are reserved:
//! - `kind`: the kind name, always present
//! - `key`: the persisted identity, present once the record has been saved
//!
//! A record without a `key` is *new*.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::format::format_kind;
use crate::value::Value;

/// Reserved field holding the kind name
pub const KIND_FIELD: &str = "kind";
/// Reserved field holding the record key
pub const KEY_FIELD: &str = "key";

/// An instance of a kind
///
/// Fields are kept in a `BTreeMap` so iteration (and everything derived from
/// it, such as backend write order) is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record of the given kind
    pub fn new(kind: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(KIND_FIELD.to_string(), Value::String(format_kind(kind)));
        Self { fields }
    }

    /// Build a record from raw fields, as read back from a backend
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Builder-style key assignment
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.set_key(key);
        self
    }

    /// The kind name, if present
    pub fn kind(&self) -> Option<&str> {
        self.fields.get(KIND_FIELD).and_then(Value::as_str)
    }

    /// The record key, if persisted
    pub fn key(&self) -> Option<&str> {
        self.fields.get(KEY_FIELD).and_then(Value::as_str)
    }

    /// Assign the record key
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.fields
            .insert(KEY_FIELD.to_string(), Value::String(key.into()));
    }

    /// True when the record has never been persisted
    pub fn is_new(&self) -> bool {
        !self.fields.contains_key(KEY_FIELD)
    }

    /// Read a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Write a field, returning the previous value
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.to_string(), value.into())
    }

    /// Remove a field
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// True when the field is present
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields, reserved fields included
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record holds no fields at all
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the underlying map
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Consume into the underlying map
    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }

    /// Copy every field of `other` over this record
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Object(r.fields)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
