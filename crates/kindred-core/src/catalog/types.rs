//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};

/// Scalar data types a mapped field can declare.
///
/// The datastore only stores wide types; narrower types here are widened on
/// write and narrowed again on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Single character, stored as an integer code point.
    Char,
    /// UTF-8 string.
    String,
    /// Byte array, stored as a blob.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// Datastore key.
    Key,
    /// An enumeration, stored by constant name.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed constant names.
        variants: Vec<String>,
    },
}

/// Field types - flat representation without recursion.
///
/// Relation targets and embedded types are referenced by entity name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// A non-nullable scalar value.
    Scalar(ScalarType),
    /// A nullable scalar value.
    OptionalScalar(ScalarType),
    /// A fixed array of scalar values.
    Array(ScalarType),
    /// An ordered list of scalar values.
    List(ScalarType),
    /// A set of scalar values.
    Set(ScalarType),
    /// An embedded object stored in the owner's record.
    Embedded(String),
    /// A single related entity.
    Reference(String),
    /// A collection of related entities.
    Collection(String),
    /// An arbitrary value that is always stored serialized.
    Opaque(String),
}

impl ScalarType {
    /// Create an enum type.
    pub fn enumeration(name: impl Into<String>, variants: &[&str]) -> Self {
        ScalarType::Enum {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::Int16
                | ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Float32
                | ScalarType::Float64
        )
    }

    /// Check if this type is a key representation (raw or encoded).
    pub fn is_key_like(&self) -> bool {
        matches!(self, ScalarType::Key | ScalarType::String)
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            ScalarType::Enum { name, .. } => name.clone(),
            other => format!("{other:?}").to_lowercase(),
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Check if this field type accepts null values.
    pub fn is_nullable(&self) -> bool {
        !matches!(self, FieldType::Scalar(_))
    }

    /// Check if this is a multi-valued scalar type.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            FieldType::Array(_) | FieldType::List(_) | FieldType::Set(_)
        )
    }

    /// The scalar type carried by this field, if it has one.
    pub fn scalar_type(&self) -> Option<&ScalarType> {
        match self {
            FieldType::Scalar(s)
            | FieldType::OptionalScalar(s)
            | FieldType::Array(s)
            | FieldType::List(s)
            | FieldType::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the embedded entity, if this is an embedded field.
    pub fn embedded_entity(&self) -> Option<&str> {
        match self {
            FieldType::Embedded(entity) => Some(entity),
            _ => None,
        }
    }

    /// Name of the related entity, if this is a relation-valued field.
    pub fn related_entity(&self) -> Option<&str> {
        match self {
            FieldType::Reference(entity) | FieldType::Collection(entity) => Some(entity),
            _ => None,
        }
    }

    /// Type name used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.type_name(),
            FieldType::OptionalScalar(s) => format!("Option<{}>", s.type_name()),
            FieldType::Array(s) => format!("[{}]", s.type_name()),
            FieldType::List(s) => format!("List<{}>", s.type_name()),
            FieldType::Set(s) => format!("Set<{}>", s.type_name()),
            FieldType::Embedded(e) | FieldType::Reference(e) | FieldType::Opaque(e) => e.clone(),
            FieldType::Collection(e) => format!("Collection<{e}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullability() {
        assert!(!FieldType::scalar(ScalarType::Int32).is_nullable());
        assert!(FieldType::optional_scalar(ScalarType::Int32).is_nullable());
        assert!(FieldType::List(ScalarType::String).is_nullable());
        assert!(FieldType::Embedded("Name".into()).is_nullable());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ScalarType::Int16.type_name(), "int16");
        assert_eq!(
            FieldType::List(ScalarType::enumeration("Color", &["RED"])).type_name(),
            "List<Color>"
        );
        assert_eq!(FieldType::Collection("Book".into()).type_name(), "Collection<Book>");
    }

    #[test]
    fn test_accessors() {
        let list = FieldType::Set(ScalarType::Char);
        assert!(list.is_multi_valued());
        assert_eq!(list.scalar_type(), Some(&ScalarType::Char));
        assert_eq!(FieldType::Reference("Book".into()).related_entity(), Some("Book"));
        assert_eq!(FieldType::Embedded("Name".into()).embedded_entity(), Some("Name"));
    }
}
