//! Hash-store adapter
//!
//! # Persisted layout
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `<key>` | hash | field → text, `kind` and `key` included |
//! | `__metadata__<key>` | hash | field → type tag |
//! | `__kindset__:<kind>` | set | keys of every record of the kind |
//!
//! Record keys are global in the hash keyspace, so `pack_key` and
//! `unpack_key` are identity.
//!
//! Writing a record (data hash, metadata hash, kind-set membership) is one
//! atomic batch. A key rewritten under another kind drops its old hashes
//! and leaves its old kind set in the same batch. Queries batch-read every member of the kind set and run
//! filter, sort, offset and limit in process.

use std::sync::Arc;

use tracing::debug;

use polystore_core::pipeline;
use polystore_core::{
    Datastore, Error, KeyCodec, KeyGenerator, Query, Record, Result, UuidKeyGenerator, Value,
    KIND_FIELD,
};

use crate::client::{Command, HashClient, HashMapping};
use crate::codec::{self, kind_set_key, meta_key, TypeTag};
use crate::memory::MemoryHashClient;

const BACKEND: &str = "hash";

/// Datastore over a hash server
pub struct HashDatastore<C = MemoryHashClient> {
    client: C,
    keys: Arc<dyn KeyGenerator>,
}

impl HashDatastore<MemoryHashClient> {
    /// Adapter over a fresh in-process server with random keys
    pub fn in_memory() -> Self {
        Self::new(MemoryHashClient::new(), Arc::new(UuidKeyGenerator))
    }
}

impl<C: HashClient> HashDatastore<C> {
    /// Adapter over `client`, taking new keys from `keys`
    pub fn new(client: C, keys: Arc<dyn KeyGenerator>) -> Self {
        Self { client, keys }
    }

    /// The underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    fn create_one(&self, mut record: Record) -> Result<Record> {
        if record.key().is_none() {
            record.set_key(self.keys.generate());
        }
        self.persist(&record)?;
        Ok(record)
    }

    fn persist(&self, record: &Record) -> Result<()> {
        let (Some(kind), Some(key)) = (record.kind(), record.key()) else {
            return Err(Error::schema("record must carry both kind and key to persist"));
        };

        let mut data = Vec::with_capacity(record.len());
        let mut meta = Vec::with_capacity(record.len());
        for (field, value) in record.iter() {
            let (text, tag) = codec::encode(value)?;
            data.push((field.clone(), text));
            meta.push((field.clone(), tag.as_str().to_string()));
        }

        let previous = self
            .client
            .hget(key, KIND_FIELD)
            .map_err(|e| Error::adapter(BACKEND, e))?;

        let mut batch = Vec::with_capacity(6);
        if let Some(previous) = previous.filter(|p| p != kind) {
            debug!(from = %previous, to = %kind, key = %key, "Record changes kind");
            batch.extend([
                Command::Del {
                    key: key.to_string(),
                },
                Command::Del { key: meta_key(key) },
                Command::SRem {
                    key: kind_set_key(&previous),
                    member: key.to_string(),
                },
            ]);
        }
        debug!(kind = %kind, key = %key, fields = data.len(), "Persisting record");
        batch.extend([
            Command::HSet {
                key: key.to_string(),
                fields: data,
            },
            Command::HSet {
                key: meta_key(key),
                fields: meta,
            },
            Command::SAdd {
                key: kind_set_key(kind),
                member: key.to_string(),
            },
        ]);
        self.client
            .multi(batch)
            .map_err(|e| Error::adapter(BACKEND, e))?;
        Ok(())
    }

    fn cast_record(data: HashMapping, meta: &HashMapping) -> Result<Record> {
        data.into_iter()
            .map(|(field, text)| {
                let tag = match meta.get(&field) {
                    Some(spelling) => Some(spelling.parse::<TypeTag>()?),
                    None => None,
                };
                let value = codec::decode(&field, text, tag)?;
                Ok((field, value))
            })
            .collect()
    }

    fn find_by_kind(&self, kind: &str) -> Result<Vec<Record>> {
        let members = self
            .client
            .smembers(&kind_set_key(kind))
            .map_err(|e| Error::adapter(BACKEND, e))?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let commands = members
            .iter()
            .flat_map(|key| {
                [
                    Command::HGetAll { key: key.clone() },
                    Command::HGetAll { key: meta_key(key) },
                ]
            })
            .collect();
        let replies = self
            .client
            .multi(commands)
            .map_err(|e| Error::adapter(BACKEND, e))?;

        let mut records = Vec::with_capacity(members.len());
        let mut replies = replies.into_iter();
        while let (Some(data), Some(meta)) = (replies.next(), replies.next()) {
            let data = data.into_hash().map_err(|e| Error::adapter(BACKEND, e))?;
            let meta = meta.into_hash().map_err(|e| Error::adapter(BACKEND, e))?;
            if data.is_empty() {
                continue;
            }
            let record = Self::cast_record(data, &meta)?;
            if record.kind() != Some(kind) {
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl<C: HashClient> KeyCodec for HashDatastore<C> {
    fn pack_key(&self, _kind: &str, key: &Value) -> Result<Value> {
        Ok(key.clone())
    }

    fn unpack_key(&self, _kind: &str, key: &Value) -> Result<Value> {
        Ok(key.clone())
    }
}

impl<C: HashClient> Datastore for HashDatastore<C> {
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
                    self.persist(&record)?;
                    Ok(record)
                }
            })
            .collect()
    }

    fn create(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        records.into_iter().map(|r| self.create_one(r)).collect()
    }

    fn find_by_key(&self, kind: &str, key: &str) -> Result<Option<Record>> {
        let data = self
            .client
            .hgetall(key)
            .map_err(|e| Error::adapter(BACKEND, e))?;
        if data.is_empty() {
            return Ok(None);
        }
        let meta = self
            .client
            .hgetall(&meta_key(key))
            .map_err(|e| Error::adapter(BACKEND, e))?;
        let record = Self::cast_record(data, &meta)?;
        if record.kind() != Some(kind) {
            debug!(kind = %kind, key = %key, "Key belongs to another kind");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn find(&self, query: &Query) -> Result<Vec<Record>> {
        let candidates = self.find_by_kind(&query.kind)?;
        let scanned = candidates.len();
        let records = pipeline::run_query(candidates, query);
        debug!(kind = %query.kind, scanned, returned = records.len(), "Hash find");
        Ok(records)
    }

    fn delete_by_key(&self, kind: &str, key: &str) -> Result<()> {
        let stored_kind = self
            .client
            .hget(key, KIND_FIELD)
            .map_err(|e| Error::adapter(BACKEND, e))?
            .unwrap_or_else(|| kind.to_string());
        debug!(kind = %stored_kind, key = %key, "Hash delete");
        self.client
            .multi(vec![
                Command::Del {
                    key: key.to_string(),
                },
                Command::Del { key: meta_key(key) },
                Command::SRem {
                    key: kind_set_key(&stored_kind),
                    member: key.to_string(),
                },
            ])
            .map_err(|e| Error::adapter(BACKEND, e))?;
        Ok(())
    }

    fn delete(&self, query: &Query) -> Result<()> {
        for record in self.find(query)? {
            if let (Some(kind), Some(key)) = (record.kind(), record.key()) {
                self.delete_by_key(kind, key)?;
            }
        }
        Ok(())
    }

    fn count(&self, query: &Query) -> Result<u64> {
        let candidates = self.find_by_kind(&query.kind)?;
        Ok(pipeline::count_matching(&candidates, &query.filters))
    }
}

impl<C> std::fmt::Debug for HashDatastore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDatastore")
            .field("backend", &BACKEND)
            .finish_non_exhaustive()
    }
}

