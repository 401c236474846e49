//! Session: the uniform persistence API
//!
//! A session pairs an immutable [`Schema`] with the datastore it is bound to.
//! Every operation packs application records through the schema, hands them
//! to the datastore, and unpacks what comes back. Sessions are cheap to
//! clone and safe to share between threads.
//!
//! An unbound session still validates queries, but every operation that
//! needs a backend fails with `Error::Binding`.

use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::debug;

use polystore_core::format::format_kind;
use polystore_core::{
    Datastore, Error, FindOptions, KeyCodec, Query, Record, Result, Schema, Value,
};

use crate::config::DatastoreConfig;

/// Borrowed view of a datastore as a key codec
struct BoundKeys<'a>(&'a dyn Datastore);

impl KeyCodec for BoundKeys<'_> {
    fn pack_key(&self, kind: &str, key: &Value) -> Result<Value> {
        self.0.pack_key(kind, key)
    }

    fn unpack_key(&self, kind: &str, key: &Value) -> Result<Value> {
        self.0.unpack_key(kind, key)
    }
}

/// Schema plus bound datastore
#[derive(Clone)]
pub struct Session {
    schema: Arc<Schema>,
    datastore: Option<Arc<dyn Datastore>>,
}

impl Session {
    /// Session bound to `datastore`
    pub fn new(schema: Arc<Schema>, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            schema,
            datastore: Some(datastore),
        }
    }

    /// Session with no datastore
    pub fn unbound(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            datastore: None,
        }
    }

    /// Session bound to the datastore a config names
    pub fn open(schema: Arc<Schema>, config: &DatastoreConfig) -> Result<Self> {
        Ok(Self::new(schema, config.open()?))
    }

    /// Same schema, another datastore
    pub fn with_datastore(&self, datastore: Arc<dyn Datastore>) -> Self {
        Self::new(Arc::clone(&self.schema), datastore)
    }

    /// The schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The bound datastore
    ///
    /// # Errors
    ///
    /// `Binding` when the session is unbound.
    pub fn datastore(&self) -> Result<&dyn Datastore> {
        self.datastore
            .as_deref()
            .ok_or_else(|| Error::binding("no datastore is bound to this session"))
    }

    /// Save one record: create if new, update otherwise
    pub fn save(&self, record: Record) -> Result<Record> {
        let backend = self.datastore()?.name();
        single(backend, self.save_many(vec![record])?)
    }

    /// Save records: each is created if new, updated otherwise
    pub fn save_many(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let datastore = self.datastore()?;
        let keys = BoundKeys(datastore);
        let packed = self.schema.pack_records(records, Some(&keys))?;
        debug!(backend = datastore.name(), count = packed.len(), "Session save");
        let saved = datastore.save(packed)?;
        self.schema.unpack_records(saved, Some(&keys))
    }

    /// Create one record, honoring a caller-supplied key
    pub fn create(&self, record: Record) -> Result<Record> {
        let backend = self.datastore()?.name();
        single(backend, self.create_many(vec![record])?)
    }

    /// Create records, honoring caller-supplied keys
    pub fn create_many(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let datastore = self.datastore()?;
        let keys = BoundKeys(datastore);
        let packed = self.schema.pack_records(records, Some(&keys))?;
        debug!(backend = datastore.name(), count = packed.len(), "Session create");
        let created = datastore.create(packed)?;
        self.schema.unpack_records(created, Some(&keys))
    }

    /// Fetch one record; `None` when absent
    pub fn find_by_key(&self, kind: &str, key: &str) -> Result<Option<Record>> {
        let datastore = self.datastore()?;
        let keys = BoundKeys(datastore);
        match datastore.find_by_key(&format_kind(kind), key)? {
            Some(record) => Ok(Some(self.schema.unpack_record(record, Some(&keys))?)),
            None => Ok(None),
        }
    }

    /// Records of a kind matching the options
    ///
    /// # Errors
    ///
    /// `Schema` for a bad operator or order spelling, raised before the
    /// datastore is contacted.
    pub fn find_by_kind(&self, kind: &str, options: &FindOptions) -> Result<Vec<Record>> {
        let (datastore, query) = self.query(kind, options)?;
        let keys = BoundKeys(datastore);
        let found = datastore.find(&query)?;
        self.schema.unpack_records(found, Some(&keys))
    }

    /// Remove one record; absent keys are not an error
    pub fn delete_by_key(&self, kind: &str, key: &str) -> Result<()> {
        self.datastore()?.delete_by_key(&format_kind(kind), key)
    }

    /// Remove every record of a kind matching the options
    pub fn delete_by_kind(&self, kind: &str, options: &FindOptions) -> Result<()> {
        let (datastore, query) = self.query(kind, options)?;
        datastore.delete(&query)
    }

    /// Count records of a kind matching the options, ignoring limit and offset
    pub fn count_by_kind(&self, kind: &str, options: &FindOptions) -> Result<u64> {
        let (datastore, query) = self.query(kind, options)?;
        datastore.count(&query)
    }

    fn query(
        &self,
        kind: &str,
        options: &FindOptions,
    ) -> Result<(&dyn Datastore, Query)> {
        let bound = self.datastore.as_deref().map(|d| BoundKeys(d));
        let query = self
            .schema
            .build_query(kind, options, bound.as_ref().map(|k| k as &dyn KeyCodec))?;
        Ok((self.datastore()?, query))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("schema", &self.schema)
            .field("backend", &self.datastore.as_ref().map(|d| d.name()))
            .finish()
    }
}

/// A write acknowledged without echoing the record back
#[derive(Debug, ThisError)]
#[error("datastore returned no record for a single write")]
struct EmptyReply;

fn single(backend: &'static str, mut records: Vec<Record>) -> Result<Record> {
    records.pop().ok_or_else(|| Error::adapter(backend, EmptyReply))
}
