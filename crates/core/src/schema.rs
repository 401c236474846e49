//! Kind schemas and record packing
//!
//! ## Configuration phase
//!
//! A [`SchemaBuilder`] collects kind definitions and type registrations.
//! [`SchemaBuilder::build`] freezes them into a [`Schema`], which is
//! immutable and meant to be shared behind an `Arc` by every session. There
//! is no way to mutate a built schema, so registration can never race with
//! read traffic.
//!
//! ## Packing
//!
//! - Pack (application → storage): every declared field takes its value, or
//!   its default when absent or Null, runs it through its packer and lands
//!   under its storage name. Undeclared fields are dropped.
//! - Unpack (storage → application): every declared field is read at its
//!   storage name, unpacked, and written back under its canonical name.
//! - `kind` and `key` pass through both directions.
//! - Records of undefined kinds pass through untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::format::{format_field, format_kind, format_record};
use crate::record::{Record, KEY_FIELD, KIND_FIELD};
use crate::traits::KeyCodec;
use crate::types::{self, EmbeddedKindPacker, ForeignKeyPacker, PackContext, Packer};
use crate::value::Value;

/// Field holding the creation instant, stamped on first save
pub const CREATED_AT: &str = "created_at";
/// Field holding the last-update instant, stamped on every later save
pub const UPDATED_AT: &str = "updated_at";

/// Schema metadata for one field
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    storage_name: String,
    default: Value,
    type_tag: Option<String>,
    packer: Option<Arc<dyn Packer>>,
}

impl FieldSpec {
    fn new(name: String) -> Self {
        Self {
            storage_name: name.clone(),
            name,
            default: Value::Null,
            type_tag: None,
            packer: None,
        }
    }

    /// Declare the field's type tag
    pub fn of_type(&mut self, tag: &str) -> &mut Self {
        self.type_tag = Some(tag.to_string());
        self
    }

    /// Value used when the record has none
    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = value.into();
        self
    }

    /// Store the field under a different name
    pub fn storage_name(&mut self, name: &str) -> &mut Self {
        self.storage_name = format_field(name);
        self
    }

    /// Explicit pack/unpack override; wins over the type tag
    pub fn packer(&mut self, packer: Arc<dyn Packer>) -> &mut Self {
        self.packer = Some(packer);
        self
    }

    /// Canonical (application) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the backend stores the field under
    pub fn db_name(&self) -> &str {
        &self.storage_name
    }

    /// Declared default
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Declared type tag
    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    fn resolve<'a>(&'a self, ctx: &PackContext<'a>) -> Option<&'a dyn Packer> {
        if let Some(packer) = &self.packer {
            return Some(packer.as_ref());
        }
        self.type_tag
            .as_deref()
            .and_then(|tag| ctx.schema().packer_for(tag))
    }

    /// Application value → storage representation
    pub fn pack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        match self.resolve(ctx) {
            Some(packer) => packer.pack(value, ctx),
            None => Ok(value),
        }
    }

    /// Storage representation → application value
    pub fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        match self.resolve(ctx) {
            Some(packer) => packer.unpack(value, ctx),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("storage_name", &self.storage_name)
            .field("default", &self.default)
            .field("type_tag", &self.type_tag)
            .field("has_override", &self.packer.is_some())
            .finish()
    }
}

/// Schema metadata for one kind
#[derive(Debug, Clone)]
pub struct KindSpec {
    kind: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl KindSpec {
    fn new(kind: String) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Declare (or redeclare) a field
    pub fn field(&mut self, name: &str) -> &mut FieldSpec {
        let name = format_field(name);
        self.fields
            .entry(name.clone())
            .or_insert_with(|| FieldSpec::new(name))
    }

    /// Kind name
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Look up a field by canonical name
    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.get(field)
    }

    /// True when the kind declares the field
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Declared fields in name order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in self.fields.values() {
            if spec.storage_name == KIND_FIELD || spec.storage_name == KEY_FIELD {
                return Err(Error::schema(format!(
                    "field '{}' of kind '{}' may not be stored as reserved name '{}'",
                    spec.name, self.kind, spec.storage_name
                )));
            }
            if !seen.insert(spec.storage_name.as_str()) {
                return Err(Error::schema(format!(
                    "kind '{}' stores two fields under '{}'",
                    self.kind, spec.storage_name
                )));
            }
        }
        Ok(())
    }
}

/// Configuration phase: collects kinds and type packers
pub struct SchemaBuilder {
    kinds: HashMap<String, KindSpec>,
    packers: HashMap<String, Arc<dyn Packer>>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Builder preloaded with the built-in coercion types
    pub fn new() -> Self {
        let packers = types::builtins()
            .into_iter()
            .map(|(tag, packer)| (tag.to_string(), packer))
            .collect();
        Self {
            kinds: HashMap::new(),
            packers,
        }
    }

    /// Define a kind
    ///
    /// The closure declares the kind's fields. Defining a kind also registers
    /// a type of the same name that embeds records of the kind. Redefining a
    /// kind replaces the earlier definition.
    ///
    /// # Errors
    ///
    /// `Schema` when two fields share a storage name, or a field is stored
    /// under a reserved name.
    pub fn define_kind<F>(&mut self, kind: &str, fields: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut KindSpec),
    {
        let kind = format_kind(kind);
        let mut spec = KindSpec::new(kind.clone());
        fields(&mut spec);
        spec.validate()?;

        info!(kind = %kind, fields = spec.fields.len(), "Defined kind");
        self.packers
            .insert(kind.clone(), Arc::new(EmbeddedKindPacker::new(kind.clone())));
        self.kinds.insert(kind, spec);
        Ok(self)
    }

    /// Register (or replace) the packer for a type tag
    pub fn register_type(&mut self, tag: &str, packer: Arc<dyn Packer>) -> &mut Self {
        self.packers.insert(tag.to_string(), packer);
        self
    }

    /// True when a packer is registered for the tag
    pub fn has_type(&self, tag: &str) -> bool {
        self.packers.contains_key(tag)
    }

    /// Type tag for references to records of `kind`
    ///
    /// The first call registers the foreign-key packer; later calls return
    /// the same tag without registering anything.
    pub fn foreign_key(&mut self, kind: &str) -> String {
        let kind = format_kind(kind);
        let tag = types::foreign_key_tag(&kind);
        if !self.packers.contains_key(&tag) {
            info!(kind = %kind, tag = %tag, "Registered foreign key type");
            self.packers
                .insert(tag.clone(), Arc::new(ForeignKeyPacker::new(kind)));
        }
        tag
    }

    /// Freeze into an immutable schema
    pub fn build(self) -> Schema {
        Schema {
            kinds: self.kinds,
            packers: self.packers,
        }
    }
}

/// Immutable kinds + type packers, shared by every operation
pub struct Schema {
    kinds: HashMap<String, KindSpec>,
    packers: HashMap<String, Arc<dyn Packer>>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.packers.keys().collect();
        types.sort();
        f.debug_struct("Schema")
            .field("kinds", &self.kinds)
            .field("types", &types)
            .finish()
    }
}

impl Schema {
    /// Schema with built-in types only
    pub fn empty() -> Self {
        SchemaBuilder::new().build()
    }

    /// Look up a kind
    pub fn kind_spec(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    /// Packer registered for a type tag
    pub fn packer_for(&self, tag: &str) -> Option<&dyn Packer> {
        self.packers.get(tag).map(|p| p.as_ref())
    }

    /// Pack one record for storage, stamping timestamps
    ///
    /// After packing, a new record whose kind declares `created_at` gets it
    /// stamped; otherwise a kind declaring `updated_at` gets that stamped.
    /// Never both.
    pub fn pack_record(&self, record: Record, keys: Option<&dyn KeyCodec>) -> Result<Record> {
        let ctx = PackContext::new(self, keys);
        let mut packed = self.pack_fields(record, &ctx)?;
        self.stamp_timestamps(&mut packed, &ctx)?;
        Ok(packed)
    }

    /// Unpack one stored record
    pub fn unpack_record(&self, record: Record, keys: Option<&dyn KeyCodec>) -> Result<Record> {
        let ctx = PackContext::new(self, keys);
        self.unpack_fields(record, &ctx)
    }

    /// Pack many records
    pub fn pack_records(
        &self,
        records: Vec<Record>,
        keys: Option<&dyn KeyCodec>,
    ) -> Result<Vec<Record>> {
        records
            .into_iter()
            .map(|r| self.pack_record(r, keys))
            .collect()
    }

    /// Unpack many records
    pub fn unpack_records(
        &self,
        records: Vec<Record>,
        keys: Option<&dyn KeyCodec>,
    ) -> Result<Vec<Record>> {
        records
            .into_iter()
            .map(|r| self.unpack_record(r, keys))
            .collect()
    }

    /// Storage name of a field, formatted; non-schema fields pass through
    pub fn pack_field(&self, kind: &str, field: &str) -> String {
        let field = format_field(field);
        match self.kinds.get(kind).and_then(|spec| spec.get(&field)) {
            Some(spec) => spec.storage_name.clone(),
            None => field,
        }
    }

    /// Pack a comparison value through the field's packer
    pub fn pack_value(
        &self,
        kind: &str,
        field: &str,
        value: Value,
        ctx: &PackContext<'_>,
    ) -> Result<Value> {
        let field = format_field(field);
        match self.kinds.get(kind).and_then(|spec| spec.get(&field)) {
            Some(spec) => spec.pack(value, ctx),
            None => Ok(value),
        }
    }

    /// Field-level pack without timestamp stamping
    pub fn pack_fields(&self, record: Record, ctx: &PackContext<'_>) -> Result<Record> {
        self.create_entity(record, |record, entity, spec| {
            let value = match record.get(&spec.name) {
                Some(v) if !v.is_null() => v.clone(),
                _ => spec.default.clone(),
            };
            entity.set(&spec.storage_name, spec.pack(value, ctx)?);
            Ok(())
        })
    }

    /// Field-level unpack
    pub fn unpack_fields(&self, record: Record, ctx: &PackContext<'_>) -> Result<Record> {
        self.create_entity(record, |record, entity, spec| {
            let value = record.get(&spec.storage_name).cloned().unwrap_or(Value::Null);
            entity.set(&spec.name, spec.unpack(value, ctx)?);
            Ok(())
        })
    }

    fn create_entity<F>(&self, record: Record, mut each_field: F) -> Result<Record>
    where
        F: FnMut(&Record, &mut Record, &FieldSpec) -> Result<()>,
    {
        let kind = match record.kind() {
            Some(kind) => format_kind(kind),
            None => return Ok(record),
        };
        let Some(spec) = self.kinds.get(&kind) else {
            debug!(kind = %kind, "No schema for kind, passing record through");
            return Ok(record);
        };

        let record = format_record(record);
        let mut entity = Record::new(&kind);
        if let Some(key) = record.get(KEY_FIELD) {
            entity.set(KEY_FIELD, key.clone());
        }
        for field in spec.fields.values() {
            each_field(&record, &mut entity, field)?;
        }
        Ok(entity)
    }

    fn stamp_timestamps(&self, record: &mut Record, ctx: &PackContext<'_>) -> Result<()> {
        let Some(spec) = record.kind().and_then(|k| self.kinds.get(k)) else {
            return Ok(());
        };
        let field = if record.is_new() && spec.has_field(CREATED_AT) {
            CREATED_AT
        } else if spec.has_field(UPDATED_AT) {
            UPDATED_AT
        } else {
            return Ok(());
        };
        if let Some(field_spec) = spec.get(field) {
            let stamp = field_spec.pack(Value::Int(types::now_micros()), ctx)?;
            record.set(&field_spec.storage_name, stamp);
        }
        Ok(())
    }
}
