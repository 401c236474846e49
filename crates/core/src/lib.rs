//! Core types and traits for Polystore
//!
//! This crate defines everything that is independent of a storage backend:
//! - Value: Unified value enum for all field data
//! - Record: Field map that names its kind and, once saved, its key
//! - Schema: Kinds, fields, defaults, storage names and type packers
//! - Types: Built-in packers (string, integer, float, boolean, timestamp,
//!   foreign keys, embedded kinds)
//! - Query: Operator/order normalization and the canonical query model
//! - Pipeline: In-process filter, sort, offset and limit
//! - Traits: The adapter contract (Datastore, KeyCodec, KeyGenerator)
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod format;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod schema;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{BoxError, Error, Result};
pub use format::{format_field, format_kind};
pub use query::{Filter, FindOptions, Operator, Order, Query, Sort};
pub use record::{Record, KEY_FIELD, KIND_FIELD};
pub use schema::{FieldSpec, KindSpec, Schema, SchemaBuilder, CREATED_AT, UPDATED_AT};
pub use traits::{Datastore, KeyCodec, KeyGenerator, SequentialKeyGenerator, UuidKeyGenerator};
pub use types::{FnPacker, PackContext, Packer};
pub use value::Value;
