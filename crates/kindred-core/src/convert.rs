//! Type conversion between object-model values and datastore values.
//!
//! The datastore stores integers as 64-bit values, floating point numbers as
//! doubles, characters as integer code points, enums by constant name and
//! byte arrays as blobs. Arrays, lists and sets all become typed multi-valued
//! properties. Writes widen; reads narrow back to the declared type and fail
//! if the stored value does not fit.

use crate::catalog::{FieldType, ScalarType};
use crate::error::Error;
use crate::object::FieldValue;
use kindred_proto::Value;

/// Convert a field value into the value stored for a field of `field_type`.
pub fn to_datastore(value: &FieldValue, field_type: &FieldType) -> Result<Value, Error> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match field_type {
        FieldType::Scalar(scalar) | FieldType::OptionalScalar(scalar) => {
            scalar_to_datastore(value, scalar)
        }
        FieldType::Array(scalar) | FieldType::List(scalar) | FieldType::Set(scalar) => {
            let elements = value.elements().ok_or_else(|| mismatch(field_type, value))?;
            elements_to_datastore(elements, scalar)
        }
        other => Err(Error::Internal(format!(
            "{} fields are not stored as plain properties",
            other.type_name()
        ))),
    }
}

/// Convert a stored value back into a value for a field of `field_type`.
///
/// A null stored for an array, list or set reads back as an empty container.
/// A null stored for a scalar reads back as null; the caller decides whether
/// the field accepts it.
pub fn from_datastore(value: &Value, field_type: &FieldType) -> Result<FieldValue, Error> {
    match field_type {
        FieldType::Scalar(scalar) | FieldType::OptionalScalar(scalar) => {
            if value.is_null() {
                Ok(FieldValue::Null)
            } else {
                scalar_from_datastore(value, scalar)
            }
        }
        FieldType::Array(scalar) | FieldType::List(scalar) | FieldType::Set(scalar) => {
            let elements = if value.is_null() {
                Vec::new()
            } else if value.is_array() {
                value
                    .elements()
                    .iter()
                    .map(|element| scalar_from_datastore(element, scalar))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                return Err(Error::TypeConversion {
                    expected: field_type.type_name(),
                    found: value.type_name().to_string(),
                });
            };
            Ok(match field_type {
                FieldType::Array(_) => FieldValue::Array(elements),
                FieldType::List(_) => FieldValue::List(elements),
                _ => FieldValue::Set(elements),
            })
        }
        other => Err(Error::Internal(format!(
            "{} fields are not read from plain properties",
            other.type_name()
        ))),
    }
}

/// Convert a value to its natural stored form, without a declared field type.
///
/// Used for query parameters and literals compared against stored properties.
pub fn natural(value: &FieldValue) -> Result<Value, Error> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Byte(i) => Value::Int64(*i as i64),
        FieldValue::Short(i) => Value::Int64(*i as i64),
        FieldValue::Int(i) => Value::Int64(*i as i64),
        FieldValue::Long(i) => Value::Int64(*i),
        FieldValue::Float(f) => Value::Float64(*f as f64),
        FieldValue::Double(f) => Value::Float64(*f),
        FieldValue::Char(c) => Value::Int64(*c as u32 as i64),
        FieldValue::String(s) | FieldValue::Enum(s) => Value::String(s.clone()),
        FieldValue::Bytes(b) => Value::Bytes(b.clone()),
        FieldValue::Timestamp(t) => Value::Timestamp(*t),
        FieldValue::Key(k) => Value::Key(k.clone()),
        other => {
            return Err(Error::TypeConversion {
                expected: "a scalar value".to_string(),
                found: other.type_name().to_string(),
            })
        }
    })
}

fn scalar_to_datastore(value: &FieldValue, scalar: &ScalarType) -> Result<Value, Error> {
    let stored = match (value, scalar) {
        (FieldValue::Bool(b), ScalarType::Bool) => Value::Bool(*b),
        (FieldValue::Byte(i), ScalarType::Int8) => Value::Int64(*i as i64),
        (FieldValue::Short(i), ScalarType::Int16) => Value::Int64(*i as i64),
        (FieldValue::Int(i), ScalarType::Int32) => Value::Int64(*i as i64),
        (FieldValue::Long(i), ScalarType::Int64) => Value::Int64(*i),
        (FieldValue::Float(f), ScalarType::Float32) => Value::Float64(*f as f64),
        (FieldValue::Double(f), ScalarType::Float64) => Value::Float64(*f),
        (FieldValue::Char(c), ScalarType::Char) => Value::Int64(*c as u32 as i64),
        (FieldValue::String(s), ScalarType::String) => Value::String(s.clone()),
        (FieldValue::Bytes(b), ScalarType::Bytes) => Value::Bytes(b.clone()),
        (FieldValue::Timestamp(t), ScalarType::Timestamp) => Value::Timestamp(*t),
        (FieldValue::Key(k), ScalarType::Key) => Value::Key(k.clone()),
        (FieldValue::Enum(name), ScalarType::Enum { variants, .. }) if variants.contains(name) => {
            Value::String(name.clone())
        }
        _ => {
            return Err(Error::TypeConversion {
                expected: scalar.type_name(),
                found: value.type_name().to_string(),
            })
        }
    };
    Ok(stored)
}

fn elements_to_datastore(elements: &[FieldValue], scalar: &ScalarType) -> Result<Value, Error> {
    if elements.iter().any(FieldValue::is_null) {
        return Err(Error::Mapping(format!(
            "collections of {} cannot contain null elements",
            scalar.type_name()
        )));
    }
    let stored = elements
        .iter()
        .map(|element| scalar_to_datastore(element, scalar))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match scalar {
        ScalarType::Bool => Value::BoolArray(stored.iter().filter_map(Value::as_bool).collect()),
        ScalarType::Float32 | ScalarType::Float64 => {
            Value::Float64Array(stored.iter().filter_map(Value::as_f64).collect())
        }
        ScalarType::String | ScalarType::Enum { .. } => Value::StringArray(
            stored
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        ScalarType::Key => Value::KeyArray(stored.iter().filter_map(|v| v.as_key().cloned()).collect()),
        ScalarType::Bytes => Value::BytesArray(
            stored
                .iter()
                .filter_map(|v| v.as_bytes().map(<[u8]>::to_vec))
                .collect(),
        ),
        ScalarType::Timestamp => {
            Value::Int64Array(stored.iter().filter_map(Value::as_timestamp).collect())
        }
        ScalarType::Int8
        | ScalarType::Int16
        | ScalarType::Int32
        | ScalarType::Int64
        | ScalarType::Char => Value::Int64Array(stored.iter().filter_map(Value::as_i64).collect()),
    })
}

fn scalar_from_datastore(value: &Value, scalar: &ScalarType) -> Result<FieldValue, Error> {
    let fail = || Error::TypeConversion {
        expected: scalar.type_name(),
        found: value.type_name().to_string(),
    };
    let narrowed = match (value, scalar) {
        (Value::Bool(b), ScalarType::Bool) => FieldValue::Bool(*b),
        (Value::Int64(i), ScalarType::Int8) => FieldValue::Byte(i8::try_from(*i).map_err(|_| fail())?),
        (Value::Int64(i), ScalarType::Int16) => {
            FieldValue::Short(i16::try_from(*i).map_err(|_| fail())?)
        }
        (Value::Int64(i), ScalarType::Int32) => FieldValue::Int(i32::try_from(*i).map_err(|_| fail())?),
        (Value::Int64(i), ScalarType::Int64) => FieldValue::Long(*i),
        (Value::Float64(f), ScalarType::Float32) => FieldValue::Float(*f as f32),
        (Value::Float64(f), ScalarType::Float64) => FieldValue::Double(*f),
        (Value::Int64(i), ScalarType::Char) => {
            let code = u32::try_from(*i).map_err(|_| fail())?;
            FieldValue::Char(char::from_u32(code).ok_or_else(fail)?)
        }
        (Value::String(s), ScalarType::String) => FieldValue::String(s.clone()),
        (Value::Bytes(b), ScalarType::Bytes) => FieldValue::Bytes(b.clone()),
        (Value::Timestamp(t), ScalarType::Timestamp) | (Value::Int64(t), ScalarType::Timestamp) => {
            FieldValue::Timestamp(*t)
        }
        (Value::Key(k), ScalarType::Key) => FieldValue::Key(k.clone()),
        (Value::String(name), ScalarType::Enum { name: enum_name, variants }) => {
            if !variants.contains(name) {
                return Err(Error::TypeConversion {
                    expected: format!("a constant of {enum_name}"),
                    found: name.clone(),
                });
            }
            FieldValue::Enum(name.clone())
        }
        _ => return Err(fail()),
    };
    Ok(narrowed)
}

fn mismatch(field_type: &FieldType, value: &FieldValue) -> Error {
    Error::TypeConversion {
        expected: field_type.type_name(),
        found: value.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_proto::Key;

    fn color() -> ScalarType {
        ScalarType::enumeration("Color", &["RED", "GREEN"])
    }

    #[test]
    fn test_narrow_numerics_widen_on_write() {
        let short = FieldType::Scalar(ScalarType::Int16);
        assert_eq!(to_datastore(&FieldValue::Short(7), &short).unwrap(), Value::Int64(7));

        let float = FieldType::OptionalScalar(ScalarType::Float32);
        assert_eq!(to_datastore(&FieldValue::Float(1.5), &float).unwrap(), Value::Float64(1.5));

        let ch = FieldType::Scalar(ScalarType::Char);
        assert_eq!(to_datastore(&FieldValue::Char('a'), &ch).unwrap(), Value::Int64(97));
    }

    #[test]
    fn test_narrowing_on_read() {
        let byte = FieldType::Scalar(ScalarType::Int8);
        assert_eq!(from_datastore(&Value::Int64(-3), &byte).unwrap(), FieldValue::Byte(-3));
        assert!(matches!(
            from_datastore(&Value::Int64(300), &byte),
            Err(Error::TypeConversion { .. })
        ));

        let ch = FieldType::Scalar(ScalarType::Char);
        assert_eq!(from_datastore(&Value::Int64(98), &ch).unwrap(), FieldValue::Char('b'));
    }

    #[test]
    fn test_enum_by_name() {
        let field = FieldType::OptionalScalar(color());
        assert_eq!(
            to_datastore(&FieldValue::Enum("RED".into()), &field).unwrap(),
            Value::String("RED".into())
        );
        assert_eq!(
            from_datastore(&Value::String("GREEN".into()), &field).unwrap(),
            FieldValue::Enum("GREEN".into())
        );
        assert!(from_datastore(&Value::String("BLUE".into()), &field).is_err());
    }

    #[test]
    fn test_collections() {
        let chars = FieldType::List(ScalarType::Char);
        let value = FieldValue::List(vec![FieldValue::Char('a'), FieldValue::Char('z')]);
        let stored = to_datastore(&value, &chars).unwrap();
        assert_eq!(stored, Value::Int64Array(vec![97, 122]));
        assert_eq!(from_datastore(&stored, &chars).unwrap(), value);

        let colors = FieldType::Set(color());
        let stored = to_datastore(&FieldValue::Set(vec![FieldValue::Enum("RED".into())]), &colors)
            .unwrap();
        assert_eq!(stored, Value::StringArray(vec!["RED".into()]));

        let array = FieldType::Array(ScalarType::Int32);
        let stored = Value::Int64Array(vec![1, 2]);
        assert_eq!(
            from_datastore(&stored, &array).unwrap(),
            FieldValue::Array(vec![FieldValue::Int(1), FieldValue::Int(2)])
        );
    }

    #[test]
    fn test_null_collection_reads_empty() {
        let list = FieldType::List(ScalarType::String);
        assert_eq!(from_datastore(&Value::Null, &list).unwrap(), FieldValue::List(vec![]));
        assert_eq!(to_datastore(&FieldValue::Null, &list).unwrap(), Value::Null);
    }

    #[test]
    fn test_null_element_rejected() {
        let list = FieldType::List(ScalarType::String);
        let value = FieldValue::List(vec![FieldValue::Null]);
        assert!(matches!(to_datastore(&value, &list), Err(Error::Mapping(_))));
    }

    #[test]
    fn test_bytes_become_blob() {
        let bytes = FieldType::OptionalScalar(ScalarType::Bytes);
        assert_eq!(
            to_datastore(&FieldValue::Bytes(vec![1, 2]), &bytes).unwrap(),
            Value::Bytes(vec![1, 2])
        );
    }

    #[test]
    fn test_type_mismatch() {
        let int = FieldType::Scalar(ScalarType::Int32);
        assert!(matches!(
            to_datastore(&FieldValue::String("x".into()), &int),
            Err(Error::TypeConversion { .. })
        ));
        assert!(from_datastore(&Value::String("x".into()), &int).is_err());
    }

    #[test]
    fn test_natural_conversion() {
        assert_eq!(natural(&FieldValue::Int(4)).unwrap(), Value::Int64(4));
        assert_eq!(natural(&FieldValue::Char('a')).unwrap(), Value::Int64(97));
        assert_eq!(
            natural(&FieldValue::Key(Key::from_id("Book", 1))).unwrap(),
            Value::Key(Key::from_id("Book", 1))
        );
        assert!(natural(&FieldValue::List(vec![])).is_err());
    }
}
