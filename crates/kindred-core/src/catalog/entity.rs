//! Entity definitions.

use super::field::{FieldDef, FieldRole};
use serde::{Deserialize, Serialize};

/// A mapped class: either a top-level entity stored as its own records, or an
/// embeddable type whose fields are stored inside an owner's record.
///
/// Field numbers are positions in `fields`. After registration in a
/// [`Catalog`](super::Catalog) the list also contains inherited fields, which
/// come first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Stored record kind.
    pub kind: String,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
    /// Parent class whose fields this entity inherits.
    pub superclass: Option<String>,
    /// Whether this type can only be embedded.
    pub embeddable: bool,
}

impl EntityDef {
    /// Create a new entity definition stored under a kind of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: name.clone(),
            name,
            fields: Vec::new(),
            superclass: None,
            embeddable: false,
        }
    }

    /// Create an embeddable type.
    pub fn embeddable(name: impl Into<String>) -> Self {
        let mut entity = Self::new(name);
        entity.embeddable = true;
        entity
    }

    /// Set the stored kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Inherit the fields of another entity.
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field number of the named field.
    pub fn field_number(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get a field by number.
    pub fn field(&self, number: usize) -> Option<&FieldDef> {
        self.fields.get(number)
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Check if the entity has a field with the given name.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// All field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The primary-key field and its number.
    pub fn primary_key(&self) -> Option<(usize, &FieldDef)> {
        self.find_role(FieldRole::PrimaryKey)
    }

    /// The field holding the parent key and its number.
    pub fn ancestor_field(&self) -> Option<(usize, &FieldDef)> {
        self.find_role(FieldRole::Ancestor)
    }

    /// The back reference providing the parent object and its number.
    pub fn ancestor_provider(&self) -> Option<(usize, &FieldDef)> {
        self.find_role(FieldRole::AncestorProvider)
    }

    fn find_role(&self, role: FieldRole) -> Option<(usize, &FieldDef)> {
        self.fields.iter().enumerate().find(|(_, f)| f.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ScalarType;

    fn book() -> EntityDef {
        EntityDef::new("Book")
            .with_field(FieldDef::primary_key("id", ScalarType::String))
            .with_field(FieldDef::optional("title", ScalarType::String))
            .with_field(FieldDef::optional("author", ScalarType::String))
    }

    #[test]
    fn test_entity_def_builder() {
        let entity = book().with_kind("books");

        assert_eq!(entity.name, "Book");
        assert_eq!(entity.kind, "books");
        assert_eq!(entity.field_count(), 3);
        assert!(entity.has_field("title"));
        assert!(!entity.has_field("nonexistent"));
        assert_eq!(entity.field_number("author"), Some(2));
        assert_eq!(entity.field_names(), vec!["id", "title", "author"]);
    }

    #[test]
    fn test_key_roles() {
        let entity = book()
            .with_field(FieldDef::ancestor("parentId", ScalarType::Key))
            .with_field(FieldDef::parent("shelf", "Shelf"));

        assert_eq!(entity.primary_key().map(|(n, _)| n), Some(0));
        assert_eq!(entity.ancestor_field().map(|(n, _)| n), Some(3));
        assert_eq!(entity.ancestor_provider().map(|(_, f)| f.name.as_str()), Some("shelf"));
    }

    #[test]
    fn test_embeddable() {
        let name = EntityDef::embeddable("Name")
            .with_field(FieldDef::optional("first", ScalarType::String));
        assert!(name.embeddable);
        assert!(name.primary_key().is_none());
    }
}
