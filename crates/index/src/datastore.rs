//! Secondary-index adapter
//!
//! # Persisted layout
//!
//! - Bucket `<app><kind>` per kind, `app` being an optional prefix
//! - Document key = record key; the body holds every field except `kind`
//!   and `key`, which are restored on read
//! - Index entries `<field>_int` for Int fields and for Float fields under
//!   their floor, `<field>_bin` for String fields, written in the same store
//!   call as the document
//!
//! # Queries
//!
//! One filter drives an index lookup (see [`crate::planner`]), then the job
//! runs: residual filter → sort → offset → limit → pass-through. Counting
//! replaces everything after the residual filter with a count reduction.

use std::sync::Arc;

use tracing::debug;

use polystore_core::{
    Datastore, Error, KeyCodec, KeyGenerator, Query, Record, Result, UuidKeyGenerator, Value,
    KEY_FIELD, KIND_FIELD,
};

use crate::client::{index_entries, Document, IndexClient, IndexClientError, Job, JobOutput};
use crate::mapreduce::Stage;
use crate::memory::MemoryIndexClient;
use crate::planner;

const BACKEND: &str = "index";

/// Datastore over an index server
pub struct IndexDatastore<C = MemoryIndexClient> {
    client: C,
    keys: Arc<dyn KeyGenerator>,
    app: String,
}

impl IndexDatastore<MemoryIndexClient> {
    /// Adapter over a fresh in-process server with random keys
    pub fn in_memory(app: impl Into<String>) -> Self {
        Self::new(MemoryIndexClient::new(), Arc::new(UuidKeyGenerator), app)
    }
}

impl<C: IndexClient> IndexDatastore<C> {
    /// Adapter over `client`; buckets are prefixed with `app`
    pub fn new(client: C, keys: Arc<dyn KeyGenerator>, app: impl Into<String>) -> Self {
        Self {
            client,
            keys,
            app: app.into(),
        }
    }

    /// The underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Bucket holding records of `kind`
    pub fn bucket_name(&self, kind: &str) -> String {
        format!("{}{}", self.app, kind)
    }

    fn kind_of(record: &Record) -> Result<&str> {
        record
            .kind()
            .ok_or_else(|| Error::schema("record must carry a kind to persist"))
    }

    fn to_document(record: Record) -> Document {
        let mut body = record.into_fields();
        body.remove(KIND_FIELD);
        body.remove(KEY_FIELD);
        body
    }

    fn from_document(kind: &str, key: &str, body: Document) -> Record {
        let mut record = Record::from_fields(body);
        record.set(KIND_FIELD, kind);
        record.set_key(key);
        record
    }

    fn store(&self, kind: &str, key: &str, body: Document) -> Result<Record> {
        let bucket = self.bucket_name(kind);
        let entries = index_entries(&body);
        debug!(bucket = %bucket, key = %key, indexes = entries.len(), "Storing document");
        self.client
            .store(&bucket, key, body.clone(), entries)
            .map_err(|e| Error::adapter(BACKEND, e))?;
        Ok(Self::from_document(kind, key, body))
    }

    fn create_one(&self, record: Record) -> Result<Record> {
        let kind = Self::kind_of(&record)?.to_string();
        let key = match record.key() {
            Some(key) => key.to_string(),
            None => self.keys.generate(),
        };
        self.store(&kind, &key, Self::to_document(record))
    }

    fn update_one(&self, record: Record) -> Result<Record> {
        let kind = Self::kind_of(&record)?.to_string();
        let key = record
            .key()
            .ok_or_else(|| Error::schema("record must carry a string key to update"))?
            .to_string();
        let mut body = self
            .client
            .get(&self.bucket_name(&kind), &key)
            .map_err(|e| Error::adapter(BACKEND, e))?
            .unwrap_or_default();
        body.extend(Self::to_document(record));
        self.store(&kind, &key, body)
    }

    /// Job selecting the query's matches, before any terminal stage
    fn job(&self, query: &Query, paged: bool) -> Job {
        let plan = planner::plan(&query.filters);
        debug!(
            kind = %query.kind,
            index = %plan.input.index(),
            residual = plan.residual.len(),
            "Planned index lookup"
        );

        let mut stages = Vec::new();
        if !plan.residual.is_empty() {
            stages.push(Stage::Filter {
                filters: plan.residual,
            });
        }
        if paged {
            if !query.sorts.is_empty() {
                stages.push(Stage::Sort {
                    sorts: query.sorts.clone(),
                });
            }
            if let Some(n) = query.offset {
                stages.push(Stage::Offset { n });
            }
            if let Some(n) = query.limit {
                stages.push(Stage::Limit { n });
            }
        }
        Job {
            bucket: self.bucket_name(&query.kind),
            kind: query.kind.clone(),
            input: plan.input,
            stages,
        }
    }

    fn run(&self, job: &Job) -> Result<JobOutput> {
        self.client
            .run_job(job)
            .map_err(|e| Error::adapter(BACKEND, e))
    }
}

impl<C: IndexClient> KeyCodec for IndexDatastore<C> {
    fn pack_key(&self, kind: &str, key: &Value) -> Result<Value> {
        let key = match key {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            other => {
                return Err(Error::schema(format!(
                    "cannot reference a {} record by a {} key",
                    kind,
                    other.type_name()
                )))
            }
        };
        Ok(Value::String(format!("{}/{}", self.bucket_name(kind), key)))
    }

    fn unpack_key(&self, kind: &str, key: &Value) -> Result<Value> {
        let prefix = format!("{}/", self.bucket_name(kind));
        match key.as_str().and_then(|s| s.strip_prefix(&prefix)) {
            Some(key) => Ok(Value::String(key.to_string())),
            None => Err(Error::schema(format!(
                "{:?} is not a reference into bucket '{}'",
                key,
                self.bucket_name(kind)
            ))),
        }
    }
}

impl<C: IndexClient> Datastore for IndexDatastore<C> {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn save(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        records
            .into_iter()
            .map(|record| {
                if record.is_new() {
                    self.create_one(record)
                } else {
                    self.update_one(record)
                }
            })
            .collect()
    }

    fn create(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        records.into_iter().map(|r| self.create_one(r)).collect()
    }

    fn find_by_key(&self, kind: &str, key: &str) -> Result<Option<Record>> {
        let body = self
            .client
            .get(&self.bucket_name(kind), key)
            .map_err(|e| Error::adapter(BACKEND, e))?;
        Ok(body.map(|body| Self::from_document(kind, key, body)))
    }

    fn find(&self, query: &Query) -> Result<Vec<Record>> {
        let mut job = self.job(query, true);
        job.stages.push(Stage::PassThru);
        match self.run(&job)? {
            JobOutput::Records(records) => Ok(records),
            JobOutput::Count(_) => Err(Error::adapter(
                BACKEND,
                unexpected("a count where documents were requested"),
            )),
        }
    }

    fn delete_by_key(&self, kind: &str, key: &str) -> Result<()> {
        debug!(kind = %kind, key = %key, "Index delete");
        self.client
            .delete(&self.bucket_name(kind), key)
            .map_err(|e| Error::adapter(BACKEND, e))
    }

    fn delete(&self, query: &Query) -> Result<()> {
        for record in self.find(query)? {
            if let Some(key) = record.key() {
                self.delete_by_key(&query.kind, key)?;
            }
        }
        Ok(())
    }

    fn count(&self, query: &Query) -> Result<u64> {
        let mut job = self.job(query, false);
        job.stages.push(Stage::Count);
        match self.run(&job)? {
            JobOutput::Count(n) => Ok(n),
            JobOutput::Records(_) => Err(Error::adapter(
                BACKEND,
                unexpected("documents where a count was requested"),
            )),
        }
    }
}

fn unexpected(what: &str) -> IndexClientError {
    IndexClientError::InvalidRequest(format!("server returned {}", what))
}

impl<C> std::fmt::Debug for IndexDatastore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDatastore")
            .field("backend", &BACKEND)
            .field("app", &self.app)
            .finish_non_exhaustive()
    }
}
