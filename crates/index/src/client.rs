//! Index client protocol
//!
//! Documents live in named buckets under a key. Every store call carries the
//! document together with its full set of secondary index entries; the
//! server replaces both at once. Computation is submitted as a [`Job`]: an
//! index lookup selecting the input documents, then a list of
//! [`Stage`](crate::mapreduce::Stage)s the server runs over them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use polystore_core::{Record, Value};

use crate::mapreduce::Stage;

/// Reserved pseudo-index naming every document of a bucket
pub const BUCKET_INDEX: &str = "$bucket";
/// Suffix of integer indexes
pub const INT_SUFFIX: &str = "_int";
/// Suffix of binary (text) indexes
pub const BIN_SUFFIX: &str = "_bin";

/// Stored document body: field → value, without `kind` and `key`
pub type Document = BTreeMap<String, Value>;

/// Error reported by an index client
#[derive(Debug, Error)]
pub enum IndexClientError {
    /// The server could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server refused a lookup or job
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// A value held by a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexValue {
    /// Entry of an `_int` index
    Int(i64),
    /// Entry of a `_bin` index
    Bin(String),
}

impl PartialOrd for IndexValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexValue::Int(a), IndexValue::Int(b)) => a.cmp(b),
            (IndexValue::Bin(a), IndexValue::Bin(b)) => a.cmp(b),
            (IndexValue::Int(_), IndexValue::Bin(_)) => Ordering::Less,
            (IndexValue::Bin(_), IndexValue::Int(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bin(s) => write!(f, "{:?}", s),
        }
    }
}

/// One secondary index entry produced by a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Index name, `<field>_int` or `<field>_bin`
    pub index: String,
    /// Indexed value
    pub value: IndexValue,
}

/// Index projection of a document
///
/// Int fields feed `<field>_int`, String fields feed `<field>_bin`. Float
/// fields feed `<field>_int` under their floor, saturated to the i64 range;
/// NaN and other value types are not indexed.
pub fn index_entries(document: &Document) -> Vec<IndexEntry> {
    document
        .iter()
        .filter_map(|(field, value)| match value {
            Value::Int(i) => Some(IndexEntry {
                index: format!("{}{}", field, INT_SUFFIX),
                value: IndexValue::Int(*i),
            }),
            Value::Float(f) if !f.is_nan() => Some(IndexEntry {
                index: format!("{}{}", field, INT_SUFFIX),
                value: IndexValue::Int(f.floor() as i64),
            }),
            Value::String(s) => Some(IndexEntry {
                index: format!("{}{}", field, BIN_SUFFIX),
                value: IndexValue::Bin(s.clone()),
            }),
            _ => None,
        })
        .collect()
}

/// Input selection of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexQuery {
    /// Every document of the bucket
    Bucket,
    /// Documents whose index entry equals `value`
    Eq {
        /// Index name
        index: String,
        /// Exact value
        value: IndexValue,
    },
    /// Documents whose index entry lies in the inclusive range
    Range {
        /// Index name
        index: String,
        /// Inclusive lower bound, unbounded when absent
        min: Option<IndexValue>,
        /// Inclusive upper bound, unbounded when absent
        max: Option<IndexValue>,
    },
}

impl IndexQuery {
    /// Index the lookup reads
    pub fn index(&self) -> &str {
        match self {
            IndexQuery::Bucket => BUCKET_INDEX,
            IndexQuery::Eq { index, .. } | IndexQuery::Range { index, .. } => index,
        }
    }
}

/// A map/reduce job over one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Bucket to read
    pub bucket: String,
    /// Kind set on every input record before the stages run
    pub kind: String,
    /// Index lookup selecting the input
    pub input: IndexQuery,
    /// Stages run in order over the input
    pub stages: Vec<Stage>,
}

/// Result of a job
///
/// Each returned record carries its document key in `key` and the job's
/// kind in `kind`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    /// Documents kept by the final stage
    Records(Vec<Record>),
    /// Result of a count reduction
    Count(u64),
}

/// Blocking client for an index server
pub trait IndexClient: Send + Sync {
    /// Fetch one document
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Document>, IndexClientError>;

    /// Store a document and replace its index entries
    fn store(
        &self,
        bucket: &str,
        key: &str,
        document: Document,
        indexes: Vec<IndexEntry>,
    ) -> Result<(), IndexClientError>;

    /// Remove a document and its index entries; absent keys are not an error
    fn delete(&self, bucket: &str, key: &str) -> Result<(), IndexClientError>;

    /// Run a map/reduce job
    fn run_job(&self, job: &Job) -> Result<JobOutput, IndexClientError>;
}
