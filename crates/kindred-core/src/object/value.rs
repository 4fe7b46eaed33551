//! Object-model field values.

use crate::catalog::{FieldType, ScalarType};
use kindred_proto::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Handle of a managed domain object.
///
/// Handles are unique across all execution contexts in the process, so an
/// object can be recognized as foreign to a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    /// Raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An embedded object: a value of an embeddable type stored inside its
/// owner's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedValue {
    /// Embeddable type name.
    pub entity: String,
    /// Field values by field number of the embeddable type.
    pub fields: Vec<FieldValue>,
}

impl EmbeddedValue {
    /// Create an embedded value from its field values.
    pub fn new(entity: impl Into<String>, fields: Vec<FieldValue>) -> Self {
        Self {
            entity: entity.into(),
            fields,
        }
    }
}

/// A value held by a domain object field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 8-bit integer.
    Byte(i8),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Character.
    Char(char),
    /// String.
    String(String),
    /// Byte array.
    Bytes(Vec<u8>),
    /// Timestamp (microseconds since Unix epoch).
    Timestamp(i64),
    /// Datastore key.
    Key(Key),
    /// Enum constant name.
    Enum(String),
    /// Fixed-size array.
    Array(Vec<FieldValue>),
    /// Ordered list.
    List(Vec<FieldValue>),
    /// Set.
    Set(Vec<FieldValue>),
    /// String-keyed map, for opaque values.
    Map(BTreeMap<String, FieldValue>),
    /// Embedded object.
    Embedded(EmbeddedValue),
    /// Reference to a managed object.
    Reference(ObjectId),
    /// Collection of managed objects.
    Collection(Vec<ObjectId>),
}

impl FieldValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Byte(_) => "int8",
            FieldValue::Short(_) => "int16",
            FieldValue::Int(_) => "int32",
            FieldValue::Long(_) => "int64",
            FieldValue::Float(_) => "float32",
            FieldValue::Double(_) => "float64",
            FieldValue::Char(_) => "char",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Key(_) => "key",
            FieldValue::Enum(_) => "enum",
            FieldValue::Array(_) => "array",
            FieldValue::List(_) => "list",
            FieldValue::Set(_) => "set",
            FieldValue::Map(_) => "map",
            FieldValue::Embedded(_) => "embedded",
            FieldValue::Reference(_) => "reference",
            FieldValue::Collection(_) => "collection",
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as key reference.
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            FieldValue::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Try to get as a managed-object reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            FieldValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a collection of managed objects.
    pub fn as_collection(&self) -> Option<&[ObjectId]> {
        match self {
            FieldValue::Collection(ids) => Some(ids),
            _ => None,
        }
    }

    /// Try to get as an embedded value.
    pub fn as_embedded(&self) -> Option<&EmbeddedValue> {
        match self {
            FieldValue::Embedded(e) => Some(e),
            _ => None,
        }
    }

    /// Elements of an array, list or set.
    pub fn elements(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) | FieldValue::List(items) | FieldValue::Set(items) => {
                Some(items)
            }
            _ => None,
        }
    }

    /// Check whether this value may be stored in a field of the given type.
    ///
    /// Nullable and non-nullable variants of a scalar type accept the same
    /// non-null values.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (FieldValue::Null, field_type) => field_type.is_nullable(),
            (_, FieldType::Opaque(_)) => !self.holds_references(),
            (value, FieldType::Scalar(s) | FieldType::OptionalScalar(s)) => value.is_scalar_of(s),
            (FieldValue::Array(items), FieldType::Array(s))
            | (FieldValue::List(items), FieldType::List(s))
            | (FieldValue::Set(items), FieldType::Set(s)) => {
                items.iter().all(|item| item.is_scalar_of(s))
            }
            (FieldValue::Embedded(value), FieldType::Embedded(entity)) => value.entity == *entity,
            (FieldValue::Reference(_), FieldType::Reference(_)) => true,
            (FieldValue::Collection(_), FieldType::Collection(_)) => true,
            _ => false,
        }
    }

    /// Check whether this is a non-null value of the given scalar type.
    pub fn is_scalar_of(&self, scalar: &ScalarType) -> bool {
        match (self, scalar) {
            (FieldValue::Bool(_), ScalarType::Bool)
            | (FieldValue::Byte(_), ScalarType::Int8)
            | (FieldValue::Short(_), ScalarType::Int16)
            | (FieldValue::Int(_), ScalarType::Int32)
            | (FieldValue::Long(_), ScalarType::Int64)
            | (FieldValue::Float(_), ScalarType::Float32)
            | (FieldValue::Double(_), ScalarType::Float64)
            | (FieldValue::Char(_), ScalarType::Char)
            | (FieldValue::String(_), ScalarType::String)
            | (FieldValue::Bytes(_), ScalarType::Bytes)
            | (FieldValue::Timestamp(_), ScalarType::Timestamp)
            | (FieldValue::Key(_), ScalarType::Key) => true,
            (FieldValue::Enum(name), ScalarType::Enum { variants, .. }) => variants.contains(name),
            _ => false,
        }
    }

    /// Check whether this value contains references to managed objects.
    pub fn holds_references(&self) -> bool {
        match self {
            FieldValue::Reference(_) | FieldValue::Collection(_) => true,
            FieldValue::Array(items) | FieldValue::List(items) | FieldValue::Set(items) => {
                items.iter().any(FieldValue::holds_references)
            }
            FieldValue::Map(entries) => entries.values().any(FieldValue::holds_references),
            FieldValue::Embedded(value) => value.fields.iter().any(FieldValue::holds_references),
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Long(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<Key> for FieldValue {
    fn from(v: Key) -> Self {
        FieldValue::Key(v)
    }
}

impl From<ObjectId> for FieldValue {
    fn from(v: ObjectId) -> Self {
        FieldValue::Reference(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => FieldValue::Null,
        }
    }
}
