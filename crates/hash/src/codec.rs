//! Field value ↔ hash text codec
//!
//! Hash servers only hold text, so every field is written alongside a type
//! tag in a parallel metadata hash and read back through the rule its tag
//! implies.
//!
//! | Value | Tag | Text |
//! |-------|-----|------|
//! | String | `String` | as is |
//! | Int | `Integer` | decimal |
//! | Float | `Number` | decimal |
//! | Bool | `Boolean` | `true` / `false` |
//! | Null | `Null` | empty |
//! | Array | `Array` | JSON |
//! | Object | `Object` | JSON |
//! | Bytes | `Any` | base64 (reads back as String) |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use polystore_core::{Error, Result, Value};

/// Prefix of the metadata hash paired with each record
pub const META_PREFIX: &str = "__metadata__";
/// Prefix of the per-kind membership set
pub const KIND_SET_PREFIX: &str = "__kindset__:";

/// Key of the metadata hash for a record key
pub fn meta_key(key: &str) -> String {
    format!("{}{}", META_PREFIX, key)
}

/// Key of the membership set for a kind
pub fn kind_set_key(kind: &str) -> String {
    format!("{}{}", KIND_SET_PREFIX, kind)
}

/// Type tag recorded for each stored field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Text
    String,
    /// Whole number
    Integer,
    /// Floating point number
    Number,
    /// Boolean literal
    Boolean,
    /// Null
    Null,
    /// JSON array
    Array,
    /// JSON object
    Object,
    /// Anything else, read back as text
    Any,
}

impl TypeTag {
    /// Tag for a value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => TypeTag::String,
            Value::Int(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Number,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Null => TypeTag::Null,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Bytes(_) => TypeTag::Any,
        }
    }

    /// Stored spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "String",
            TypeTag::Integer => "Integer",
            TypeTag::Number => "Number",
            TypeTag::Boolean => "Boolean",
            TypeTag::Null => "Null",
            TypeTag::Array => "Array",
            TypeTag::Object => "Object",
            TypeTag::Any => "Any",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "String" => Ok(TypeTag::String),
            "Integer" => Ok(TypeTag::Integer),
            "Number" => Ok(TypeTag::Number),
            "Boolean" => Ok(TypeTag::Boolean),
            "Null" => Ok(TypeTag::Null),
            "Array" => Ok(TypeTag::Array),
            "Object" => Ok(TypeTag::Object),
            "Any" => Ok(TypeTag::Any),
            other => Err(Error::Serialization(format!("unknown type tag '{}'", other))),
        }
    }
}

/// Encode a value as (text, tag)
pub fn encode(value: &Value) -> Result<(String, TypeTag)> {
    let tag = TypeTag::of(value);
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(&serde_json::Value::from(value.clone()))?
        }
        Value::Bytes(b) => STANDARD.encode(b),
    };
    Ok((text, tag))
}

/// Decode stored text through its tag
///
/// A missing tag reads the text as a String.
pub fn decode(field: &str, text: String, tag: Option<TypeTag>) -> Result<Value> {
    let Some(tag) = tag else {
        warn!(field = %field, "Hash field has no type tag, reading as text");
        return Ok(Value::String(text));
    };
    match tag {
        TypeTag::String | TypeTag::Any => Ok(Value::String(text)),
        TypeTag::Integer => match text.parse::<i64>() {
            Ok(i) => Ok(Value::Int(i)),
            Err(e) => Err(malformed(field, tag, &text, e)),
        },
        TypeTag::Number => match text.parse::<f64>() {
            Ok(f) => Ok(Value::Float(f)),
            Err(e) => Err(malformed(field, tag, &text, e)),
        },
        TypeTag::Boolean => Ok(Value::Bool(text == "true")),
        TypeTag::Null => Ok(Value::Null),
        TypeTag::Array | TypeTag::Object => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Ok(Value::from(json)),
            Err(e) => Err(malformed(field, tag, &text, e)),
        },
    }
}

fn malformed(field: &str, tag: TypeTag, text: &str, reason: impl fmt::Display) -> Error {
    Error::Serialization(format!(
        "field '{}' tagged {} holds '{}': {}",
        field, tag, text, reason
    ))
}
