//! Property value types.

use crate::key::Key;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::cmp::Ordering;

/// A property value as the datastore stores it.
///
/// The datastore only knows a few wide types: all integers are 64-bit, all
/// floating point values are double precision, and binary data is an opaque
/// blob. Narrower object-model types are widened before they get here.
///
/// Note: Arrays are typed (e.g., Int64Array, KeyArray) to avoid recursive
/// type issues with rkyv serialization. A multi-valued property is stored as
/// one of the array variants.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Reference to another record.
    Key(Key),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of 64-bit integers.
    Int64Array(Vec<i64>),
    /// Array of 64-bit floats.
    Float64Array(Vec<f64>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of keys.
    KeyArray(Vec<Key>),
    /// Array of blobs.
    BytesArray(Vec<Vec<u8>>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::Int64Array(_)
                | Value::Float64Array(_)
                | Value::StringArray(_)
                | Value::KeyArray(_)
                | Value::BytesArray(_)
        )
    }

    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "blob",
            Value::Key(_) => "key",
            Value::Timestamp(_) => "timestamp",
            Value::BoolArray(_) => "bool[]",
            Value::Int64Array(_) => "int64[]",
            Value::Float64Array(_) => "float64[]",
            Value::StringArray(_) => "string[]",
            Value::KeyArray(_) => "key[]",
            Value::BytesArray(_) => "blob[]",
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            Value::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as key reference.
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Split a multi-valued property into its single values.
    ///
    /// Scalars yield themselves. Filters on a multi-valued property match when
    /// any of these elements matches.
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Value::BoolArray(items) => items.iter().copied().map(Value::Bool).collect(),
            Value::Int64Array(items) => items.iter().copied().map(Value::Int64).collect(),
            Value::Float64Array(items) => items.iter().copied().map(Value::Float64).collect(),
            Value::StringArray(items) => items.iter().cloned().map(Value::String).collect(),
            Value::KeyArray(items) => items.iter().cloned().map(Value::Key).collect(),
            Value::BytesArray(items) => items.iter().cloned().map(Value::Bytes).collect(),
            other => vec![other.clone()],
        }
    }

    /// Compare two scalar values of compatible types.
    ///
    /// Integers and floats compare numerically. Returns `None` for incompatible
    /// types and for arrays.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Int64(a), Value::Float64(b)) => (*a as f64).partial_cmp(b),
            (Value::Float64(a), Value::Int64(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Key(a), Value::Key(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Rank of the value's type in the datastore's mixed-type sort order.
    pub fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int64(_) | Value::Float64(_) => 1,
            Value::Timestamp(_) => 2,
            Value::Bool(_) => 3,
            Value::Bytes(_) => 4,
            Value::String(_) => 5,
            Value::Key(_) => 6,
            _ => 7,
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Key> for Value {
    fn from(v: Key) -> Self {
        Value::Key(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int64Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl From<Vec<Key>> for Value {
    fn from(v: Vec<Key>) -> Self {
        Value::KeyArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
