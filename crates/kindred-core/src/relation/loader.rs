//! Materialization of stored records as managed objects.

use super::{ForeignKeyStore, RelationResolver};
use crate::catalog::{FieldDef, Relation};
use crate::error::Error;
use crate::mapper::Mapper;
use crate::mapping::FieldManager;
use crate::object::{ExecutionContext, FieldValue, ObjectId};
use crate::storage::Datastore;
use kindred_proto::Record;
use tracing::{debug, warn};

/// Loads records into an execution context, following owned relations.
///
/// A record whose key is already managed resolves to the managed object, so
/// loading a graph with back references terminates.
pub struct Loader<'a, 'c> {
    mapper: &'a Mapper,
    datastore: &'a dyn Datastore,
    ctx: &'c mut ExecutionContext,
}

impl<'a, 'c> Loader<'a, 'c> {
    /// Create a loader.
    pub fn new(
        mapper: &'a Mapper,
        datastore: &'a dyn Datastore,
        ctx: &'c mut ExecutionContext,
    ) -> Self {
        Self {
            mapper,
            datastore,
            ctx,
        }
    }

    /// Load one record and return the managed object.
    pub fn load(&mut self, record: Record) -> Result<ObjectId, Error> {
        if let Some(id) = self.ctx.find_by_key(&record.key) {
            return Ok(id);
        }
        let mapper = self.mapper;
        let entity = mapper
            .catalog()
            .entity_for_kind(record.kind())
            .ok_or_else(|| Error::Mapping(format!("no entity is stored as kind {}", record.kind())))?;

        let id = self.ctx.create(&entity.name)?;
        // managed before its fields so back references resolve to it
        self.ctx.mark_persistent(id, record.key.clone())?;
        debug!(object = %id, key = %record.key, entity = %entity.name, "loading record");

        let mut fields = FieldManager::for_read(mapper, id, entity, record)?;
        for number in 0..entity.field_count() {
            let value = fields.fetch_field(self, number)?;
            self.ctx.set_loaded(id, number, value)?;
        }
        Ok(id)
    }

    /// Load several records in order.
    pub fn load_all(&mut self, records: Vec<Record>) -> Result<Vec<ObjectId>, Error> {
        records.into_iter().map(|record| self.load(record)).collect()
    }

    fn load_children(&mut self, record: &Record, field: &FieldDef) -> Result<Vec<ObjectId>, Error> {
        let store = ForeignKeyStore::new(self.mapper, self.datastore, field)?;
        let children = store.children(record, &[], &[])?;
        self.load_all(children)
    }

    fn load_parent(&mut self, record: &Record, field: &FieldDef) -> Result<FieldValue, Error> {
        let Some(parent) = record.parent() else {
            return Ok(FieldValue::Null);
        };
        if let Some(id) = self.ctx.find_by_key(&parent) {
            return Ok(FieldValue::Reference(id));
        }
        match self.datastore.get(&parent)? {
            Some(parent) => Ok(FieldValue::Reference(self.load(parent)?)),
            None => {
                warn!(
                    field = %field.name,
                    key = %record.key,
                    parent = %parent,
                    "parent record does not exist"
                );
                Ok(FieldValue::Null)
            }
        }
    }
}

impl RelationResolver for Loader<'_, '_> {
    fn fetch_relation(&mut self, record: &Record, field: &FieldDef) -> Result<FieldValue, Error> {
        match &field.relation {
            Relation::OneToMany { .. } => {
                Ok(FieldValue::Collection(self.load_children(record, field)?))
            }
            Relation::OneToOne { .. } => Ok(self
                .load_children(record, field)?
                .first()
                .map(|id| FieldValue::Reference(*id))
                .unwrap_or(FieldValue::Null)),
            Relation::ManyToOne { .. } => self.load_parent(record, field),
            Relation::None => Err(Error::Internal(format!(
                "{} is not a relation field",
                field.name
            ))),
        }
    }
}
