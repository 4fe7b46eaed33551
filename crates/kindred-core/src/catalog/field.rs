//! Field definitions for entities.

use super::relation::Relation;
use super::types::{FieldType, ScalarType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The part a field plays in the record's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldRole {
    /// An ordinary value field.
    #[default]
    Plain,
    /// Holds the record's own key, raw or encoded.
    PrimaryKey,
    /// Holds the record's parent key, raw or encoded.
    Ancestor,
    /// References the object whose key becomes this record's parent.
    AncestorProvider,
}

/// How a serialized field is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Serialization {
    /// Use the configured default strategy.
    Default,
    /// Use the strategy registered under this id.
    Strategy(String),
}

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Stored property name, when it differs from the field name.
    pub column: Option<String>,
    /// Field data type.
    pub field_type: FieldType,
    /// Role in the record key.
    pub role: FieldRole,
    /// Relation carried by the field.
    pub relation: Relation,
    /// Store the value as a serialized blob.
    pub serialization: Option<Serialization>,
    /// Column overrides for the fields of an embedded type, by embedded field name.
    pub embedded_columns: BTreeMap<String, String>,
}

impl FieldDef {
    /// Create a new field.
    ///
    /// Reference and collection types get an owned, unidirectional relation;
    /// use the relation constructors for anything else.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let relation = match &field_type {
            FieldType::Reference(target) => Relation::OneToOne {
                target: target.clone(),
                mapped_by: None,
            },
            FieldType::Collection(target) => Relation::OneToMany {
                target: target.clone(),
                mapped_by: None,
                ordered: false,
            },
            _ => Relation::None,
        };
        Self {
            name: name.into(),
            column: None,
            field_type,
            role: FieldRole::Plain,
            relation,
            serialization: None,
            embedded_columns: BTreeMap::new(),
        }
    }

    /// Create a nullable scalar field.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldType::OptionalScalar(scalar))
    }

    /// Create the primary-key field. `scalar` must be [`ScalarType::Key`] for a
    /// raw key or [`ScalarType::String`] for an encoded key.
    pub fn primary_key(name: impl Into<String>, scalar: ScalarType) -> Self {
        let mut field = Self::new(name, FieldType::OptionalScalar(scalar));
        field.role = FieldRole::PrimaryKey;
        field
    }

    /// Create the field holding the parent key, raw or encoded.
    pub fn ancestor(name: impl Into<String>, scalar: ScalarType) -> Self {
        let mut field = Self::new(name, FieldType::OptionalScalar(scalar));
        field.role = FieldRole::Ancestor;
        field
    }

    /// Create a back reference to the owning object, which becomes the parent.
    pub fn parent(name: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        let mut field = Self::new(name, FieldType::Reference(target.clone()));
        field.role = FieldRole::AncestorProvider;
        field.relation = Relation::ManyToOne { target };
        field
    }

    /// Create an owned one-to-many collection.
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Collection(target.into()))
    }

    /// Create an owned one-to-one reference.
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Reference(target.into()))
    }

    /// Create an embedded field.
    pub fn embedded(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(name, FieldType::Embedded(entity.into()))
    }

    /// Set the stored property name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Name the field on the related entity that points back here.
    pub fn mapped_by(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        match &mut self.relation {
            Relation::OneToOne { mapped_by, .. } | Relation::OneToMany { mapped_by, .. } => {
                *mapped_by = Some(field);
            }
            _ => {}
        }
        self
    }

    /// Store element positions for a one-to-many list.
    pub fn ordered(mut self) -> Self {
        if let Relation::OneToMany { ordered, .. } = &mut self.relation {
            *ordered = true;
        }
        self
    }

    /// Store the value serialized with the default strategy.
    pub fn serialized(mut self) -> Self {
        self.serialization = Some(Serialization::Default);
        self
    }

    /// Store the value serialized with a named strategy.
    pub fn serialized_with(mut self, strategy: impl Into<String>) -> Self {
        self.serialization = Some(Serialization::Strategy(strategy.into()));
        self
    }

    /// Override the stored property name of one field of the embedded type.
    pub fn with_embedded_column(
        mut self,
        field: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.embedded_columns.insert(field.into(), column.into());
        self
    }

    /// Stored property name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Check if this is the primary-key field.
    pub fn is_primary_key(&self) -> bool {
        self.role == FieldRole::PrimaryKey
    }

    /// Check if this field holds the parent key.
    pub fn is_ancestor(&self) -> bool {
        self.role == FieldRole::Ancestor
    }

    /// Check if this field is embedded.
    pub fn is_embedded(&self) -> bool {
        matches!(self.field_type, FieldType::Embedded(_))
    }

    /// Check if this field is stored serialized.
    pub fn is_serialized(&self) -> bool {
        self.serialization.is_some() || matches!(self.field_type, FieldType::Opaque(_))
    }

    /// Check if this field is relation-valued.
    pub fn is_relation(&self) -> bool {
        !self.relation.is_none()
    }
}
