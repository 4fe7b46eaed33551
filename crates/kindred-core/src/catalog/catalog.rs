//! Catalog of mapped entities.

use super::entity::EntityDef;
use super::field::{FieldDef, FieldRole};
use super::relation::Relation;
use super::types::FieldType;
use crate::error::Error;
use std::collections::HashMap;
use tracing::debug;

/// A mapping the hosting framework maintains on behalf of another entity's
/// relation, for records that carry no field of their own for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMapping {
    /// Entity that declares the relation.
    pub owner: String,
    /// Relation field on the owner.
    pub field: String,
    /// What the mapping holds.
    pub kind: ExternalMappingKind,
}

/// Kind of value an external mapping holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalMappingKind {
    /// The owner's key.
    ForeignKey,
    /// The element's position in the owner's list, stored under `property`.
    Ordinal {
        /// Stored property name.
        property: String,
    },
}

/// Stored property holding an element's position in the owner's list.
pub fn ordinal_property(owner_field: &FieldDef) -> String {
    format!("{}_index", owner_field.column_name())
}

/// Registry of entity definitions.
///
/// Registration resolves inheritance, so every registered entity's field list
/// is complete and its field numbers are stable.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, EntityDef>,
    kinds: HashMap<String, String>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a JSON array of entity definitions, registered in order.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let entities: Vec<EntityDef> =
            serde_json::from_str(json).map_err(|e| Error::Catalog(e.to_string()))?;
        let mut catalog = Self::new();
        for entity in entities {
            catalog.register(entity)?;
        }
        Ok(catalog)
    }

    /// Register an entity.
    ///
    /// Superclasses and embedded types must be registered first.
    pub fn register(&mut self, mut entity: EntityDef) -> Result<(), Error> {
        if self.entities.contains_key(&entity.name) {
            return Err(Error::Catalog(format!(
                "entity {} is already registered",
                entity.name
            )));
        }

        if let Some(superclass) = &entity.superclass {
            let parent = self.require(superclass)?;
            let mut fields = parent.fields.clone();
            fields.append(&mut entity.fields);
            entity.fields = fields;
        }

        self.validate(&entity)?;

        if !entity.embeddable {
            if let Some(existing) = self.kinds.get(&entity.kind) {
                return Err(Error::Catalog(format!(
                    "kind {} is already mapped by {}",
                    entity.kind, existing
                )));
            }
            self.kinds.insert(entity.kind.clone(), entity.name.clone());
        }

        debug!(
            entity = %entity.name,
            kind = %entity.kind,
            fields = entity.fields.len(),
            "registered entity"
        );
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    fn validate(&self, entity: &EntityDef) -> Result<(), Error> {
        for (i, field) in entity.fields.iter().enumerate() {
            if entity.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::Catalog(format!(
                    "{} declares field {} more than once",
                    entity.name, field.name
                )));
            }
        }

        for role in [
            FieldRole::PrimaryKey,
            FieldRole::Ancestor,
            FieldRole::AncestorProvider,
        ] {
            let count = entity.fields.iter().filter(|f| f.role == role).count();
            if count > 1 {
                return Err(Error::Catalog(format!(
                    "{} declares {count} fields with role {role:?}",
                    entity.name
                )));
            }
        }

        if entity.embeddable
            && entity
                .fields
                .iter()
                .any(|f| f.role != FieldRole::Plain || f.is_relation())
        {
            return Err(Error::Catalog(format!(
                "embeddable type {} cannot declare key or relation fields",
                entity.name
            )));
        }

        for field in &entity.fields {
            if let FieldType::Embedded(target) = &field.field_type {
                let embedded = match self.entities.get(target) {
                    Some(embedded) if embedded.embeddable => embedded,
                    Some(_) => {
                        return Err(Error::Catalog(format!(
                            "{}.{} embeds {target}, which is not embeddable",
                            entity.name, field.name
                        )))
                    }
                    None => {
                        return Err(Error::Catalog(format!(
                            "{}.{} embeds unknown type {target}",
                            entity.name, field.name
                        )))
                    }
                };
                for overridden in field.embedded_columns.keys() {
                    if !embedded.has_field(overridden) {
                        return Err(Error::UnknownField {
                            entity: target.clone(),
                            field: overridden.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Get an entity by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity by name, failing if it is not registered.
    pub fn require(&self, name: &str) -> Result<&EntityDef, Error> {
        self.entity(name)
            .ok_or_else(|| Error::Catalog(format!("unknown entity {name}")))
    }

    /// Get the entity stored under a record kind.
    pub fn entity_for_kind(&self, kind: &str) -> Option<&EntityDef> {
        self.kinds.get(kind).and_then(|name| self.entities.get(name))
    }

    /// Names of all registered entities, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check whether instances of `from` can be used where `to` is declared.
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        let mut current = Some(from);
        while let Some(name) = current {
            if name == to {
                return true;
            }
            current = self
                .entities
                .get(name)
                .and_then(|e| e.superclass.as_deref());
        }
        false
    }

    /// Mappings other entities' relations impose on records of `entity`.
    ///
    /// A unidirectional owned relation has no field on the element side, so
    /// the owner key arrives as an external foreign key. Ordered lists
    /// additionally store each element's position.
    pub fn external_mappings(&self, entity: &str) -> Vec<ExternalMapping> {
        let mut mappings = Vec::new();
        let mut owners: Vec<&EntityDef> = self.entities.values().collect();
        owners.sort_by(|a, b| a.name.cmp(&b.name));

        for owner in owners {
            for field in &owner.fields {
                let (target, mapped_by, ordered) = match &field.relation {
                    Relation::OneToMany {
                        target,
                        mapped_by,
                        ordered,
                    } => (target, mapped_by, *ordered),
                    Relation::OneToOne { target, mapped_by } => (target, mapped_by, false),
                    _ => continue,
                };
                if !self.is_assignable(entity, target) {
                    continue;
                }
                if mapped_by.is_none() {
                    mappings.push(ExternalMapping {
                        owner: owner.name.clone(),
                        field: field.name.clone(),
                        kind: ExternalMappingKind::ForeignKey,
                    });
                }
                if ordered {
                    mappings.push(ExternalMapping {
                        owner: owner.name.clone(),
                        field: field.name.clone(),
                        kind: ExternalMappingKind::Ordinal {
                            property: ordinal_property(field),
                        },
                    });
                }
            }
        }
        mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ScalarType;

    fn library() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .register(
                EntityDef::embeddable("Name")
                    .with_field(FieldDef::optional("first", ScalarType::String))
                    .with_field(FieldDef::optional("last", ScalarType::String)),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Shelf")
                    .with_field(FieldDef::primary_key("id", ScalarType::Key))
                    .with_field(FieldDef::one_to_many("books", "Book").ordered())
                    .with_field(FieldDef::one_to_many("notes", "Note").mapped_by("shelf")),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Book")
                    .with_field(FieldDef::primary_key("id", ScalarType::String))
                    .with_field(FieldDef::embedded("author", "Name")),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Note")
                    .with_field(FieldDef::primary_key("id", ScalarType::Key))
                    .with_field(FieldDef::parent("shelf", "Shelf")),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_register_and_lookup() {
        let catalog = library();
        assert_eq!(catalog.entity_names(), vec!["Book", "Name", "Note", "Shelf"]);
        assert!(catalog.entity("Book").is_some());
        assert_eq!(catalog.entity_for_kind("Shelf").unwrap().name, "Shelf");
        assert!(catalog.entity_for_kind("Name").is_none());
        assert!(matches!(catalog.require("Missing"), Err(Error::Catalog(_))));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let mut catalog = library();
        let result = catalog.register(EntityDef::new("Book"));
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_inheritance_flattens_fields() {
        let mut catalog = library();
        catalog
            .register(
                EntityDef::new("Novel")
                    .extends("Book")
                    .with_field(FieldDef::optional("genre", ScalarType::String)),
            )
            .unwrap();

        let novel = catalog.entity("Novel").unwrap();
        assert_eq!(novel.field_names(), vec!["id", "author", "genre"]);
        assert!(catalog.is_assignable("Novel", "Book"));
        assert!(!catalog.is_assignable("Book", "Novel"));
    }

    #[test]
    fn test_embedding_non_embeddable_rejected() {
        let mut catalog = library();
        let result = catalog.register(
            EntityDef::new("Review").with_field(FieldDef::embedded("book", "Book")),
        );
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_unknown_embedded_override_rejected() {
        let mut catalog = library();
        let result = catalog.register(
            EntityDef::new("Review")
                .with_field(FieldDef::embedded("by", "Name").with_embedded_column("middle", "m")),
        );
        assert!(matches!(result, Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let mut catalog = Catalog::new();
        let result = catalog.register(
            EntityDef::new("Bad")
                .with_field(FieldDef::primary_key("a", ScalarType::Key))
                .with_field(FieldDef::primary_key("b", ScalarType::Key)),
        );
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_external_mappings() {
        let catalog = library();

        let book = catalog.external_mappings("Book");
        assert_eq!(
            book,
            vec![
                ExternalMapping {
                    owner: "Shelf".into(),
                    field: "books".into(),
                    kind: ExternalMappingKind::ForeignKey,
                },
                ExternalMapping {
                    owner: "Shelf".into(),
                    field: "books".into(),
                    kind: ExternalMappingKind::Ordinal {
                        property: "books_index".into()
                    },
                },
            ]
        );

        // bidirectional: the note's own back reference carries the owner
        assert!(catalog.external_mappings("Note").is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"name": "Tag", "kind": "Tag", "superclass": null, "embeddable": false,
             "fields": [
                {"name": "id", "column": null, "field_type": {"OptionalScalar": "Key"},
                 "role": "PrimaryKey", "relation": "None", "serialization": null,
                 "embedded_columns": {}}
             ]}
        ]"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        assert!(catalog.entity("Tag").unwrap().primary_key().is_some());
        assert!(Catalog::from_json_str("{").is_err());
    }
}
