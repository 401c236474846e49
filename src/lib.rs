//! Polystore - datastore-agnostic persistence with typed kinds
//!
//! Application code defines kinds once, then saves, finds, counts and
//! deletes records through one API while a pluggable adapter speaks the
//! backend's native protocol.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use polystore::{DatastoreConfig, FindOptions, Record, SchemaBuilder, Session};
//!
//! let mut builder = SchemaBuilder::new();
//! builder.define_kind("dog", |k| {
//!     k.field("name").of_type("string");
//!     k.field("age").of_type("integer").default(0);
//! })?;
//! let schema = Arc::new(builder.build());
//!
//! let session = Session::open(schema, &DatastoreConfig::default())?;
//! let fido = session.save(Record::new("dog").with("name", "Fido"))?;
//! assert!(fido.key().is_some());
//!
//! let young = session.find_by_kind("dog", &FindOptions::new().filter("age", "<", 2))?;
//! assert_eq!(young.len(), 1);
//! # Ok::<(), polystore::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `polystore-core`: values, records, schemas, type packers, the query
//!   model and the adapter contract
//! - `polystore-hash`: adapter for hash servers (string hashes plus type
//!   metadata, queries evaluated in process)
//! - `polystore-index`: adapter for bucketed document stores with secondary
//!   indexes and map/reduce jobs
//! - this crate: [`Session`] and [`DatastoreConfig`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod session;

pub use config::{Backend, DatastoreConfig, CONFIG_FILE_NAME};
pub use session::Session;

pub use polystore_core::{
    types, Datastore, Error, FieldSpec, Filter, FindOptions, KeyCodec, KeyGenerator, KindSpec,
    Operator, Order, Packer, Query, Record, Result, Schema, SchemaBuilder,
    SequentialKeyGenerator, Sort, UuidKeyGenerator, Value,
};
pub use polystore_hash::{HashDatastore, MemoryHashClient};
pub use polystore_index::{IndexDatastore, MemoryIndexClient};
