//! Datastore records.

use crate::error::Error;
use crate::key::Key;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::BTreeMap;

/// A record: one key plus named, typed properties.
///
/// Identity is key equality. Two record values with the same key describe the
/// same stored record even when their properties differ.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Record {
    /// Key identifying the record.
    pub key: Key,
    /// Properties by name.
    pub properties: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record with the given key.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Kind of the record.
    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    /// Parent key of the record, if any.
    pub fn parent(&self) -> Option<Key> {
        self.key.parent()
    }

    /// Get a property value.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Check whether the property is present (possibly as null).
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Set a property value, replacing any existing one.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Remove a property, returning its previous value.
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Build a copy of this record placed under `parent`.
    ///
    /// The copy keeps the kind and the id or name of this record and carries
    /// every property across.
    pub fn rebuild_with_parent(&self, parent: &Key) -> Result<Record, Error> {
        Ok(Record {
            key: self.key.with_parent(parent)?,
            properties: self.properties.clone(),
        })
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
