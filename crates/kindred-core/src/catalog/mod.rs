//! Mapping metadata.
//!
//! The catalog describes how domain classes map to records: which field holds
//! the key, which fields are embedded, serialized or relation-valued, and
//! which property name each field is stored under.

mod catalog;
mod entity;
mod field;
mod relation;
mod types;

pub use catalog::{ordinal_property, Catalog, ExternalMapping, ExternalMappingKind};
pub use entity::EntityDef;
pub use field::{FieldDef, FieldRole, Serialization};
pub use relation::Relation;
pub use types::{FieldType, ScalarType};
