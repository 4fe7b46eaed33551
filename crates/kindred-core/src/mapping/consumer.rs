//! The set of mappings one write touches.

use crate::catalog::{Catalog, EntityDef, ExternalMapping, ExternalMappingKind};

/// Field numbers and external mappings relevant to one write.
///
/// An insert covers every field plus the external foreign-key and ordinal
/// mappings other entities impose; an update covers only changed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingConsumer {
    fields: Vec<usize>,
    external: Vec<ExternalMapping>,
}

impl MappingConsumer {
    /// Mappings for inserting a new record.
    pub fn for_insert(catalog: &Catalog, entity: &EntityDef) -> Self {
        Self {
            fields: (0..entity.field_count()).collect(),
            external: catalog.external_mappings(&entity.name),
        }
    }

    /// Mappings for updating the given fields of an existing record.
    pub fn for_update(entity: &EntityDef, dirty: &[usize]) -> Self {
        let mut fields: Vec<usize> = dirty
            .iter()
            .copied()
            .filter(|n| *n < entity.field_count())
            .collect();
        fields.sort_unstable();
        fields.dedup();
        Self {
            fields,
            external: Vec::new(),
        }
    }

    /// Field numbers to write, in field order.
    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    /// External foreign-key mappings.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ExternalMapping> {
        self.external
            .iter()
            .filter(|m| m.kind == ExternalMappingKind::ForeignKey)
    }

    /// External ordinal mappings.
    pub fn ordinals(&self) -> impl Iterator<Item = &ExternalMapping> {
        self.external
            .iter()
            .filter(|m| matches!(m.kind, ExternalMappingKind::Ordinal { .. }))
    }
}
