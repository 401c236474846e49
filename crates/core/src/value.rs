//! Field values
//!
//! Every record field holds a [`Value`]. The model is closed: eight variants,
//! no implicit coercion between them. Coercion into a declared field type is
//! the job of the packers in [`crate::types`]; cross-type comparison for
//! queries (where `Int(1)` does match `Float(1.0)`) lives in
//! [`crate::pipeline`].
//!
//! Structural equality is strict:
//!
//! - different variants are never equal, so `Int(1) != Float(1.0)` and
//!   `Bytes(b"a") != String("a")`
//! - floats follow IEEE-754: `NaN != NaN`, `-0.0 == 0.0`

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field value
///
/// Objects use a `BTreeMap` so that serialized forms (JSON text in the hash
/// store, documents in the index store) are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent or explicitly empty
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit IEEE-754 float
    Float(f64),
    /// UTF-8 text
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered sequence
    Array(Vec<Value>),
    /// String-keyed map
    Object(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            _ => false,
        }
    }
}

/// `as_*` accessor returning the payload of one variant
macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, copy $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<$ty> {
            match self {
                Value::$variant(v) => Some(*v),
                _ => None,
            }
        }
    };
    ($(#[$doc:meta])* $name:ident, $variant:ident, ref $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                Value::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl Value {
    /// Variant name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// True for Null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for Int and Float
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    accessor!(
        /// The payload of a Bool
        as_bool, Bool, copy bool
    );
    accessor!(
        /// The payload of an Int
        as_int, Int, copy i64
    );
    accessor!(
        /// The payload of a Float
        as_float, Float, copy f64
    );
    accessor!(
        /// The payload of a String
        as_str, String, ref str
    );
    accessor!(
        /// The payload of a Bytes
        as_bytes, Bytes, ref [u8]
    );
    accessor!(
        /// The payload of an Array
        as_array, Array, ref [Value]
    );
    accessor!(
        /// The payload of an Object
        as_object, Object, ref BTreeMap<String, Value>
    );

    /// Numeric view of Int and Float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Rank used to order values of different types
    ///
    /// Null < Bool < number < String < Bytes < Array < Object
    pub(crate) fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! from_payload {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

from_payload! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    Vec<Value> => Array,
    BTreeMap<String, Value> => Object,
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// JSON numbers that fit an `i64` become Int; anything else becomes Float
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Bytes become base64 text and non-finite floats become null; neither
/// survives the trip back.
impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Int(i) => Json::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s),
            Value::Bytes(b) => Json::String(STANDARD.encode(b)),
            Value::Array(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            Value::Object(fields) => Json::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Json::from(v)))
                    .collect(),
            ),
        }
    }
}
