//! Type pack/unpack strategies
//!
//! A type tag names a [`Packer`]: `pack` runs on a value before it leaves for
//! storage, `unpack` after it is read back. Tags without a registered packer
//! are identity. Registration happens only while a
//! [`SchemaBuilder`](crate::schema::SchemaBuilder) is open; the built
//! [`Schema`](crate::schema::Schema) is read-only.
//!
//! Built-in tags:
//!
//! | Tag | Pack accepts | Stored as |
//! |-----|--------------|-----------|
//! | `string` | String, Int, Float, Bool | String |
//! | `integer` | Int, integral Float, numeric String | Int |
//! | `float` | Float, Int, numeric String | Float |
//! | `boolean` | Bool, `"true"`/`"false"`, `1`/`0` | Bool |
//! | `timestamp` | Int (µs since epoch), RFC 3339 String | RFC 3339 String (µs precision, UTC) |
//!
//! Null passes through every built-in untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::record::{Record, KIND_FIELD};
use crate::schema::Schema;
use crate::traits::KeyCodec;
use crate::value::Value;

/// Tag of the built-in string type
pub const STRING: &str = "string";
/// Tag of the built-in integer type
pub const INTEGER: &str = "integer";
/// Tag of the built-in float type
pub const FLOAT: &str = "float";
/// Tag of the built-in boolean type
pub const BOOLEAN: &str = "boolean";
/// Tag of the built-in timestamp type
pub const TIMESTAMP: &str = "timestamp";

/// Everything a packer may consult while converting a value
#[derive(Clone, Copy)]
pub struct PackContext<'a> {
    schema: &'a Schema,
    keys: Option<&'a dyn KeyCodec>,
}

impl<'a> PackContext<'a> {
    /// Context over a schema and, when bound, the datastore's key codec
    pub fn new(schema: &'a Schema, keys: Option<&'a dyn KeyCodec>) -> Self {
        Self { schema, keys }
    }

    /// The schema being packed against
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The bound datastore's key codec
    ///
    /// # Errors
    ///
    /// `Binding` when packing happens outside a bound session.
    pub fn keys(&self) -> Result<&'a dyn KeyCodec> {
        self.keys
            .ok_or_else(|| Error::binding("key packing requires a bound datastore"))
    }
}

/// A pack/unpack strategy registered under a type tag
pub trait Packer: Send + Sync {
    /// Application value → storage representation
    fn pack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value>;

    /// Storage representation → application value
    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value>;
}

/// Adapts a pair of plain functions into a [`Packer`]
///
/// Used for per-field overrides that need no context.
pub struct FnPacker<P, U> {
    pack: P,
    unpack: U,
}

impl<P, U> FnPacker<P, U>
where
    P: Fn(Value) -> Result<Value> + Send + Sync,
    U: Fn(Value) -> Result<Value> + Send + Sync,
{
    /// Wrap the two directions
    pub fn new(pack: P, unpack: U) -> Self {
        Self { pack, unpack }
    }
}

impl<P, U> Packer for FnPacker<P, U>
where
    P: Fn(Value) -> Result<Value> + Send + Sync,
    U: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        (self.pack)(value)
    }

    fn unpack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        (self.unpack)(value)
    }
}

fn uncoercible(tag: &str, value: &Value) -> Error {
    Error::schema(format!(
        "cannot coerce {} value to {}",
        value.type_name(),
        tag
    ))
}

// ============================================================================
// Built-in coercions
// ============================================================================

/// Coerces scalars to their text form
pub struct StringPacker;

impl Packer for StringPacker {
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value),
            Value::Int(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(uncoercible(STRING, &other)),
        }
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        self.pack(value, ctx)
    }
}

/// Coerces to a 64-bit integer
pub struct IntegerPacker;

impl Packer for IntegerPacker {
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null | Value::Int(_) => Ok(value),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            Value::String(ref s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| uncoercible(INTEGER, &value)),
            other => Err(uncoercible(INTEGER, &other)),
        }
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        self.pack(value, ctx)
    }
}

/// Coerces to a 64-bit float
pub struct FloatPacker;

impl Packer for FloatPacker {
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null | Value::Float(_) => Ok(value),
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::String(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| uncoercible(FLOAT, &value)),
            other => Err(uncoercible(FLOAT, &other)),
        }
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        self.pack(value, ctx)
    }
}

/// Coerces to a boolean
pub struct BooleanPacker;

impl Packer for BooleanPacker {
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::String(ref s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(uncoercible(BOOLEAN, &value)),
            },
            other => Err(uncoercible(BOOLEAN, &other)),
        }
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        self.pack(value, ctx)
    }
}

/// Stores instants as RFC 3339 text, hands them back as microseconds
///
/// The text form sorts lexicographically in time order because it is always
/// UTC with a fixed number of fractional digits.
pub struct TimestampPacker;

impl TimestampPacker {
    fn parse(text: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::schema(format!("invalid timestamp '{}': {}", text, e)))
    }
}

impl Packer for TimestampPacker {
    fn pack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        let instant = match value {
            Value::Null => return Ok(Value::Null),
            Value::Int(micros) => DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| Error::schema(format!("timestamp out of range: {}", micros)))?,
            Value::String(ref s) => Self::parse(s)?,
            other => return Err(uncoercible(TIMESTAMP, &other)),
        };
        Ok(Value::String(
            instant.to_rfc3339_opts(SecondsFormat::Micros, true),
        ))
    }

    fn unpack(&self, value: Value, _ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::String(ref s) => Ok(Value::Int(Self::parse(s)?.timestamp_micros())),
            Value::Null | Value::Int(_) => Ok(value),
            other => Err(uncoercible(TIMESTAMP, &other)),
        }
    }
}

/// The current instant in microseconds since the Unix epoch
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

// ============================================================================
// Schema-derived types
// ============================================================================

/// Tag under which references to `kind` are registered
pub fn foreign_key_tag(kind: &str) -> String {
    format!("{}_key", kind)
}

/// Encodes references to records of another kind through the bound
/// datastore's key codec. Accepts a single key or a sequence of keys.
pub struct ForeignKeyPacker {
    kind: String,
}

impl ForeignKeyPacker {
    /// Packer for references to `kind`
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl Packer for ForeignKeyPacker {
    fn pack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(keys) => {
                let codec = ctx.keys()?;
                keys.iter()
                    .map(|k| codec.pack_key(&self.kind, k))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            key => ctx.keys()?.pack_key(&self.kind, &key),
        }
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(keys) => {
                let codec = ctx.keys()?;
                keys.iter()
                    .map(|k| codec.unpack_key(&self.kind, k))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            key => ctx.keys()?.unpack_key(&self.kind, &key),
        }
    }
}

/// Packs a nested object as a record of a defined kind
///
/// Registered automatically under the kind's own name, so a field typed with
/// a kind name embeds that kind. A missing value packs as an empty record of
/// the kind (defaults applied).
pub struct EmbeddedKindPacker {
    kind: String,
}

impl EmbeddedKindPacker {
    /// Packer embedding records of `kind`
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    fn as_record(&self, value: Value) -> Result<Record> {
        let mut record = match value {
            Value::Null => Record::default(),
            Value::Object(fields) => Record::from_fields(fields),
            other => return Err(uncoercible(&self.kind, &other)),
        };
        record.set(KIND_FIELD, self.kind.as_str());
        Ok(record)
    }
}

impl Packer for EmbeddedKindPacker {
    fn pack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        let record = self.as_record(value)?;
        Ok(ctx.schema().pack_fields(record, ctx)?.into())
    }

    fn unpack(&self, value: Value, ctx: &PackContext<'_>) -> Result<Value> {
        let record = self.as_record(value)?;
        Ok(ctx.schema().unpack_fields(record, ctx)?.into())
    }
}

/// The packers every schema starts with
pub(crate) fn builtins() -> Vec<(&'static str, Arc<dyn Packer>)> {
    vec![
        (STRING, Arc::new(StringPacker) as Arc<dyn Packer>),
        (INTEGER, Arc::new(IntegerPacker)),
        (FLOAT, Arc::new(FloatPacker)),
        (BOOLEAN, Arc::new(BooleanPacker)),
        (TIMESTAMP, Arc::new(TimestampPacker)),
    ]
}
