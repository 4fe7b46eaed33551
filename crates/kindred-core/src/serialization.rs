//! Serialization strategies for fields stored as opaque blobs.
//!
//! A field marked serialized is written as a single bytes property. The
//! strategy that encodes it is chosen per field by id, falling back to the
//! configured default. Strategies are registered once, up front, and the
//! registry is validated against the catalog so a misnamed strategy fails at
//! startup rather than on first use.

use crate::catalog::{Catalog, FieldDef, FieldType, Serialization};
use crate::error::Error;
use crate::object::{EmbeddedValue, FieldValue};
use kindred_proto::Key;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Id of the built-in binary strategy.
pub const BINARY_STRATEGY: &str = "binary";

/// Id of the built-in JSON strategy.
pub const JSON_STRATEGY: &str = "json";

/// Encodes field values to bytes and back.
pub trait SerializationStrategy: Send + Sync {
    /// Encode a value.
    fn serialize(&self, value: &FieldValue) -> Result<Vec<u8>, Error>;

    /// Decode bytes into a value for a field of `target`.
    fn deserialize(&self, bytes: &[u8], target: &FieldType) -> Result<FieldValue, Error>;
}

/// One node of a value tree, flattened in pre-order.
///
/// Container nodes carry the number of child values that follow them, so the
/// archived form is a flat vector rather than a recursive type.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
enum Node {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u32),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
    Key(Key),
    Enum(String),
    Array(u32),
    List(u32),
    Set(u32),
    Map(Vec<String>),
    Embedded { entity: String, len: u32 },
}

/// Default strategy: an rkyv archive of the flattened value tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryStrategy;

impl BinaryStrategy {
    fn flatten(value: &FieldValue, out: &mut Vec<Node>) -> Result<(), Error> {
        let node = match value {
            FieldValue::Null => Node::Null,
            FieldValue::Bool(b) => Node::Bool(*b),
            FieldValue::Byte(i) => Node::Byte(*i),
            FieldValue::Short(i) => Node::Short(*i),
            FieldValue::Int(i) => Node::Int(*i),
            FieldValue::Long(i) => Node::Long(*i),
            FieldValue::Float(f) => Node::Float(*f),
            FieldValue::Double(f) => Node::Double(*f),
            FieldValue::Char(c) => Node::Char(*c as u32),
            FieldValue::String(s) => Node::String(s.clone()),
            FieldValue::Bytes(b) => Node::Bytes(b.clone()),
            FieldValue::Timestamp(t) => Node::Timestamp(*t),
            FieldValue::Key(k) => Node::Key(k.clone()),
            FieldValue::Enum(name) => Node::Enum(name.clone()),
            FieldValue::Array(items) | FieldValue::List(items) | FieldValue::Set(items) => {
                let len = items.len() as u32;
                out.push(match value {
                    FieldValue::Array(_) => Node::Array(len),
                    FieldValue::List(_) => Node::List(len),
                    _ => Node::Set(len),
                });
                for item in items {
                    Self::flatten(item, out)?;
                }
                return Ok(());
            }
            FieldValue::Map(entries) => {
                out.push(Node::Map(entries.keys().cloned().collect()));
                for item in entries.values() {
                    Self::flatten(item, out)?;
                }
                return Ok(());
            }
            FieldValue::Embedded(embedded) => {
                out.push(Node::Embedded {
                    entity: embedded.entity.clone(),
                    len: embedded.fields.len() as u32,
                });
                for item in &embedded.fields {
                    Self::flatten(item, out)?;
                }
                return Ok(());
            }
            FieldValue::Reference(_) | FieldValue::Collection(_) => {
                return Err(reference_error());
            }
        };
        out.push(node);
        Ok(())
    }

    fn unflatten<'a, I: Iterator<Item = &'a Node>>(nodes: &mut I) -> Result<FieldValue, Error> {
        let node = nodes
            .next()
            .ok_or_else(|| Error::Deserialization("truncated value".to_string()))?;
        Ok(match node {
            Node::Null => FieldValue::Null,
            Node::Bool(b) => FieldValue::Bool(*b),
            Node::Byte(i) => FieldValue::Byte(*i),
            Node::Short(i) => FieldValue::Short(*i),
            Node::Int(i) => FieldValue::Int(*i),
            Node::Long(i) => FieldValue::Long(*i),
            Node::Float(f) => FieldValue::Float(*f),
            Node::Double(f) => FieldValue::Double(*f),
            Node::Char(c) => FieldValue::Char(
                char::from_u32(*c)
                    .ok_or_else(|| Error::Deserialization(format!("invalid char {c:#x}")))?,
            ),
            Node::String(s) => FieldValue::String(s.clone()),
            Node::Bytes(b) => FieldValue::Bytes(b.clone()),
            Node::Timestamp(t) => FieldValue::Timestamp(*t),
            Node::Key(k) => FieldValue::Key(k.clone()),
            Node::Enum(name) => FieldValue::Enum(name.clone()),
            Node::Array(len) => FieldValue::Array(Self::children(*len, nodes)?),
            Node::List(len) => FieldValue::List(Self::children(*len, nodes)?),
            Node::Set(len) => FieldValue::Set(Self::children(*len, nodes)?),
            Node::Map(keys) => {
                let values = Self::children(keys.len() as u32, nodes)?;
                FieldValue::Map(keys.iter().cloned().zip(values).collect::<BTreeMap<_, _>>())
            }
            Node::Embedded { entity, len } => {
                FieldValue::Embedded(EmbeddedValue::new(entity.clone(), Self::children(*len, nodes)?))
            }
        })
    }

    fn children<'a, I: Iterator<Item = &'a Node>>(
        len: u32,
        nodes: &mut I,
    ) -> Result<Vec<FieldValue>, Error> {
        let mut values = Vec::with_capacity(len as usize);
        for _ in 0..len {
            values.push(Self::unflatten(nodes)?);
        }
        Ok(values)
    }
}

impl SerializationStrategy for BinaryStrategy {
    fn serialize(&self, value: &FieldValue) -> Result<Vec<u8>, Error> {
        let mut nodes = Vec::new();
        Self::flatten(value, &mut nodes)?;
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&nodes)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn deserialize(&self, bytes: &[u8], target: &FieldType) -> Result<FieldValue, Error> {
        let mut aligned = AlignedVec::<16>::new();
        aligned.extend_from_slice(bytes);
        let nodes = rkyv::from_bytes::<Vec<Node>, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))?;

        let mut iter = nodes.iter();
        let value = Self::unflatten(&mut iter)?;
        if iter.next().is_some() {
            return Err(Error::Deserialization("trailing data after value".to_string()));
        }
        check_conforms(value, target)
    }
}

/// JSON strategy, readable by tools outside this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStrategy;

impl SerializationStrategy for JsonStrategy {
    fn serialize(&self, value: &FieldValue) -> Result<Vec<u8>, Error> {
        if value.holds_references() {
            return Err(reference_error());
        }
        serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8], target: &FieldType) -> Result<FieldValue, Error> {
        let value: FieldValue =
            serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        check_conforms(value, target)
    }
}

fn reference_error() -> Error {
    Error::Serialization("references to managed objects cannot be serialized".to_string())
}

fn check_conforms(value: FieldValue, target: &FieldType) -> Result<FieldValue, Error> {
    if value.conforms_to(target) {
        Ok(value)
    } else {
        Err(Error::TypeConversion {
            expected: target.type_name(),
            found: value.type_name().to_string(),
        })
    }
}

/// Registry of serialization strategies by id.
#[derive(Clone)]
pub struct SerializerRegistry {
    strategies: HashMap<String, Arc<dyn SerializationStrategy>>,
    default_id: String,
}

impl SerializerRegistry {
    /// Create a registry holding the built-in strategies, with `default_id`
    /// used by fields that do not name a strategy.
    pub fn new(default_id: impl Into<String>) -> Self {
        let mut strategies: HashMap<String, Arc<dyn SerializationStrategy>> = HashMap::new();
        strategies.insert(BINARY_STRATEGY.to_string(), Arc::new(BinaryStrategy));
        strategies.insert(JSON_STRATEGY.to_string(), Arc::new(JsonStrategy));
        Self {
            strategies,
            default_id: default_id.into(),
        }
    }

    /// Set the default strategy id.
    pub fn with_default(mut self, default_id: impl Into<String>) -> Self {
        self.default_id = default_id.into();
        self
    }

    /// Register a strategy. Ids must be non-empty and unique.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        strategy: Arc<dyn SerializationStrategy>,
    ) -> Result<(), Error> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Catalog(
                "serialization strategy id must not be empty".to_string(),
            ));
        }
        if self.strategies.contains_key(&id) {
            return Err(Error::Catalog(format!(
                "serialization strategy {id} is already registered"
            )));
        }
        self.strategies.insert(id, strategy);
        Ok(())
    }

    /// Check whether a strategy is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.strategies.contains_key(id)
    }

    /// Id of the default strategy.
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Check that the default strategy and every strategy the catalog names
    /// are registered.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), Error> {
        if !self.contains(&self.default_id) {
            return Err(Error::Catalog(format!(
                "default serialization strategy {} is not registered",
                self.default_id
            )));
        }
        for name in catalog.entity_names() {
            let Some(entity) = catalog.entity(name) else {
                continue;
            };
            for field in &entity.fields {
                if let Some(Serialization::Strategy(id)) = &field.serialization {
                    if !self.contains(id) {
                        return Err(Error::Catalog(format!(
                            "{}.{} names unknown serialization strategy {id}",
                            entity.name, field.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Strategy that encodes a serialized field.
    pub fn for_field(&self, field: &FieldDef) -> Result<&dyn SerializationStrategy, Error> {
        let id = match &field.serialization {
            Some(Serialization::Strategy(id)) => id.as_str(),
            _ => self.default_id.as_str(),
        };
        self.strategies
            .get(id)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::Catalog(format!("unknown serialization strategy {id}")))
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new(BINARY_STRATEGY)
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.strategies.keys().collect();
        ids.sort();
        f.debug_struct("SerializerRegistry")
            .field("strategies", &ids)
            .field("default_id", &self.default_id)
            .finish()
    }
}
