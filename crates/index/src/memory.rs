//! In-process index server
//!
//! Buckets are shards of a `DashMap`, each behind its own
//! `parking_lot::RwLock`: a document and the index entries it produced
//! change under one write lock, so lookups never see one without the other.
//! Jobs on different buckets never contend.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use polystore_core::{Record, KIND_FIELD};

use crate::client::{
    Document, IndexClient, IndexClientError, IndexEntry, IndexQuery, IndexValue, Job, JobOutput,
};
use crate::mapreduce;

#[derive(Debug, Default)]
struct StoredDocument {
    body: Document,
    entries: Vec<IndexEntry>,
}

/// One bucket: documents plus the secondary indexes derived from them
#[derive(Debug, Default)]
struct Bucket {
    documents: BTreeMap<String, StoredDocument>,
    indexes: BTreeMap<String, BTreeMap<IndexValue, BTreeSet<String>>>,
}

impl Bucket {
    fn unindex(&mut self, key: &str, entries: &[IndexEntry]) {
        for entry in entries {
            if let Some(index) = self.indexes.get_mut(&entry.index) {
                if let Some(keys) = index.get_mut(&entry.value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&entry.value);
                    }
                }
                if index.is_empty() {
                    self.indexes.remove(&entry.index);
                }
            }
        }
    }

    fn put(&mut self, key: String, body: Document, entries: Vec<IndexEntry>) {
        if let Some(old) = self.documents.remove(&key) {
            self.unindex(&key, &old.entries);
        }
        for entry in &entries {
            self.indexes
                .entry(entry.index.clone())
                .or_default()
                .entry(entry.value.clone())
                .or_default()
                .insert(key.clone());
        }
        self.documents.insert(key, StoredDocument { body, entries });
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.documents.remove(key) {
            Some(old) => {
                self.unindex(key, &old.entries);
                true
            }
            None => false,
        }
    }

    /// Keys selected by a lookup, in index order
    fn lookup(&self, query: &IndexQuery) -> Result<Vec<String>, IndexClientError> {
        match query {
            IndexQuery::Bucket => Ok(self.documents.keys().cloned().collect()),
            IndexQuery::Eq { index, value } => Ok(self
                .indexes
                .get(index)
                .and_then(|idx| idx.get(value))
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default()),
            IndexQuery::Range { index, min, max } => {
                if let (Some(lo), Some(hi)) = (min, max) {
                    if std::mem::discriminant(lo) != std::mem::discriminant(hi) {
                        return Err(IndexClientError::InvalidRequest(format!(
                            "range bounds of '{}' have different types",
                            index
                        )));
                    }
                    if lo > hi {
                        return Ok(Vec::new());
                    }
                }
                let Some(idx) = self.indexes.get(index) else {
                    return Ok(Vec::new());
                };
                let lower = min.as_ref().map_or(Bound::Unbounded, Bound::Included);
                let upper = max.as_ref().map_or(Bound::Unbounded, Bound::Included);
                Ok(idx
                    .range::<IndexValue, _>((lower, upper))
                    .flat_map(|(_, keys)| keys.iter().cloned())
                    .collect())
            }
        }
    }

    /// Documents selected by a lookup as records of `kind`, in index order
    fn select(&self, kind: &str, query: &IndexQuery) -> Result<Vec<Record>, IndexClientError> {
        let keys = self.lookup(query)?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let body = self.documents.get(&key)?.body.clone();
                let mut record = Record::from_fields(body).with_key(key);
                record.set(KIND_FIELD, kind);
                Some(record)
            })
            .collect())
    }
}

/// Index server living in process memory
#[derive(Debug, Default)]
pub struct MemoryIndexClient {
    buckets: DashMap<String, Arc<RwLock<Bucket>>>,
}

impl MemoryIndexClient {
    /// No buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a bucket
    pub fn document_count(&self, bucket: &str) -> usize {
        let Some(bucket) = self.bucket(bucket) else {
            return 0;
        };
        let guard = bucket.read();
        guard.documents.len()
    }

    /// Keys holding `value` in a named index
    pub fn index_keys(&self, bucket: &str, index: &str, value: &IndexValue) -> Vec<String> {
        let Some(bucket) = self.bucket(bucket) else {
            return Vec::new();
        };
        let guard = bucket.read();
        guard
            .indexes
            .get(index)
            .and_then(|idx| idx.get(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn bucket(&self, name: &str) -> Option<Arc<RwLock<Bucket>>> {
        self.buckets.get(name).map(|b| Arc::clone(b.value()))
    }

    fn bucket_or_create(&self, name: &str) -> Arc<RwLock<Bucket>> {
        Arc::clone(self.buckets.entry(name.to_string()).or_default().value())
    }
}

impl IndexClient for MemoryIndexClient {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Document>, IndexClientError> {
        let Some(bucket) = self.bucket(bucket) else {
            return Ok(None);
        };
        let guard = bucket.read();
        Ok(guard.documents.get(key).map(|d| d.body.clone()))
    }

    fn store(
        &self,
        bucket: &str,
        key: &str,
        document: Document,
        indexes: Vec<IndexEntry>,
    ) -> Result<(), IndexClientError> {
        self.bucket_or_create(bucket)
            .write()
            .put(key.to_string(), document, indexes);
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), IndexClientError> {
        if let Some(b) = self.bucket(bucket) {
            b.write().remove(key);
        }
        Ok(())
    }

    fn run_job(&self, job: &Job) -> Result<JobOutput, IndexClientError> {
        let Some(bucket) = self.bucket(&job.bucket) else {
            return Ok(mapreduce::execute(&job.stages, Vec::new()));
        };
        let input = bucket.read().select(&job.kind, &job.input)?;
        Ok(mapreduce::execute(&job.stages, input))
    }
}
