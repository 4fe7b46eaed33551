//! Writes, loads and deletes of managed objects.

use crate::catalog::{ordinal_property, EntityDef, FieldDef, ScalarType};
use crate::error::Error;
use crate::mapper::Mapper;
use crate::mapping::{FieldManager, KeyRegistry, RelationWrite};
use crate::object::{AssociatedSlot, ExecutionContext, FieldValue, Lifecycle, ObjectId};
use crate::relation::{ForeignKeyStore, Loader};
use crate::storage::Datastore;
use kindred_proto::{Key, Record, Value};
use std::collections::HashSet;
use tracing::debug;

/// Result of inserting an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written under this key.
    Written(Key),
    /// The object is an element of an ordered list whose position is not
    /// known yet. Nothing was written; insert again once it is.
    Delayed,
}

/// One unit of work against a datastore.
///
/// A session owns the managed objects and the key registry. Each record is
/// written at most once per operation, except that an owner's child key list
/// is written in a second put once its children are keyed.
pub struct Session<'a> {
    mapper: &'a Mapper,
    datastore: &'a dyn Datastore,
    objects: ExecutionContext,
    keys: KeyRegistry,
}

impl<'a> Session<'a> {
    /// Start a unit of work.
    pub fn new(mapper: &'a Mapper, datastore: &'a dyn Datastore) -> Self {
        Self {
            mapper,
            datastore,
            objects: ExecutionContext::new(mapper.catalog_arc()),
            keys: KeyRegistry::new(),
        }
    }

    /// The mapper.
    pub fn mapper(&self) -> &'a Mapper {
        self.mapper
    }

    /// The datastore.
    pub fn datastore(&self) -> &'a dyn Datastore {
        self.datastore
    }

    /// Managed objects.
    pub fn objects(&self) -> &ExecutionContext {
        &self.objects
    }

    /// Managed objects, mutably.
    pub fn objects_mut(&mut self) -> &mut ExecutionContext {
        &mut self.objects
    }

    /// Parent keys registered during this unit of work.
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Parent keys registered during this unit of work, mutably.
    pub fn keys_mut(&mut self) -> &mut KeyRegistry {
        &mut self.keys
    }

    /// Create a transient object.
    pub fn create(&mut self, entity: &str) -> Result<ObjectId, Error> {
        self.objects.create(entity)
    }

    /// A loader over this session's objects.
    pub fn loader(&mut self) -> Loader<'a, '_> {
        Loader::new(self.mapper, self.datastore, &mut self.objects)
    }

    /// End the unit of work, returning the managed objects.
    pub fn close(mut self) -> ExecutionContext {
        if !self.keys.is_empty() {
            debug!(pending = self.keys.len(), "discarding unused parent keys");
        }
        self.keys.clear();
        self.objects
    }

    fn entity(&self, id: ObjectId) -> Result<&'a EntityDef, Error> {
        let mapper = self.mapper;
        let name = self.objects.require(id)?.entity();
        mapper.catalog().require(name)
    }

    /// Insert a transient object and cascade to the children it owns.
    pub fn insert_object(&mut self, id: ObjectId) -> Result<InsertOutcome, Error> {
        match self.objects.lifecycle(id) {
            Some(Lifecycle::Transient) => {}
            Some(state) => {
                return Err(Error::Mapping(format!(
                    "object {id} cannot be inserted in state {state:?}"
                )))
            }
            None => return Err(Error::Internal(format!("object {id} is not managed"))),
        }
        let entity = self.entity(id)?;
        let mut fields = FieldManager::for_insert(self.mapper, id, entity);

        if fields.handle_index_fields(&self.objects)? {
            debug!(object = %id, entity = %entity.name, "delaying insert until list position is known");
            return Ok(InsertOutcome::Delayed);
        }

        fields.establish_entity_group(&mut self.objects, &mut self.keys)?;
        for number in fields.consumer().fields().to_vec() {
            let value = self.objects.field_at(id, number)?.clone();
            fields.store_field(number, &value)?;
        }

        let writes = fields.take_relation_writes();
        check_distinct(entity, &writes)?;
        let mut record = fields.into_record();
        let key = self.datastore.put(record.clone())?;
        record.key = key.clone();
        debug!(object = %id, key = %key, "inserted record");

        self.objects.mark_persistent(id, key.clone())?;
        if let Some((number, field)) = entity.primary_key() {
            self.objects
                .set_loaded(id, number, key_field_value(field, &key)?)?;
        }
        self.objects.clear_dirty(id);

        self.write_relations(entity, record, writes)?;
        Ok(InsertOutcome::Written(key))
    }

    /// Write the changed fields of a persistent object.
    ///
    /// Children added to an owned relation are inserted; children removed
    /// from it are deleted.
    pub fn update_object(&mut self, id: ObjectId) -> Result<(), Error> {
        let key = match (self.objects.lifecycle(id), self.objects.key_of(id)) {
            (Some(Lifecycle::Persistent), Some(key)) => key.clone(),
            _ => {
                return Err(Error::Mapping(format!(
                    "object {id} is not persistent in this session"
                )))
            }
        };
        let dirty = self.objects.dirty_fields(id);
        if dirty.is_empty() {
            return Ok(());
        }
        let entity = self.entity(id)?;
        let stored = self
            .datastore
            .get(&key)?
            .ok_or_else(|| Error::Mapping(format!("no record is stored under {key}")))?;

        let mut fields = FieldManager::for_update(self.mapper, id, entity, stored.clone(), &dirty)?;
        for number in fields.consumer().fields().to_vec() {
            let value = self.objects.field_at(id, number)?.clone();
            fields.store_field(number, &value)?;
        }
        let writes = fields.take_relation_writes();
        check_distinct(entity, &writes)?;
        let mut record = fields.into_record();

        for write in &writes {
            let field = relation_field(entity, write)?;
            let store = ForeignKeyStore::new(self.mapper, self.datastore, field)?;
            let old_keys = store.child_keys(&stored)?;
            let new_keys = self.attach_children(entity, &key, field, write)?;

            let kept: HashSet<&Key> = new_keys.iter().collect();
            for removed in old_keys.iter().filter(|k| !kept.contains(k)) {
                self.delete_record(removed)?;
            }
            if self.mapper.config().storage_version.writes_child_keys() {
                record.set_property(field.column_name(), new_keys);
            }
        }

        self.datastore.put(record)?;
        self.objects.clear_dirty(id);
        debug!(object = %id, key = %key, fields = dirty.len(), "updated record");
        Ok(())
    }

    /// Load the object stored under `key`, if any.
    pub fn fetch_object(&mut self, key: &Key) -> Result<Option<ObjectId>, Error> {
        if let Some(id) = self.objects.find_by_key(key) {
            return Ok(Some(id));
        }
        match self.datastore.get(key)? {
            Some(record) => self.loader().load(record).map(Some),
            None => Ok(None),
        }
    }

    /// Delete a persistent object along with the children it owns.
    ///
    /// An object owned through a relation is also removed from its owner's
    /// stored key list, and from the owner's field when the owner is managed.
    pub fn delete_object(&mut self, id: ObjectId) -> Result<(), Error> {
        let key = self
            .objects
            .key_of(id)
            .cloned()
            .ok_or_else(|| Error::Mapping(format!("object {id} has not been written")))?;
        self.delete_record(&key)?;
        self.unlink_from_owner(id, &key)?;
        self.objects.mark_deleted(id)
    }

    fn unlink_from_owner(&mut self, child: ObjectId, key: &Key) -> Result<(), Error> {
        let Some(parent) = key.parent() else {
            return Ok(());
        };
        let mapper = self.mapper;
        let catalog = mapper.catalog();
        let (Some(child_entity), Some(owner)) = (
            catalog.entity_for_kind(key.kind()),
            catalog.entity_for_kind(parent.kind()),
        ) else {
            return Ok(());
        };
        let fields: Vec<(usize, &FieldDef)> = owner
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.relation.is_owner_side()
                    && f.relation
                        .target()
                        .is_some_and(|target| catalog.is_assignable(&child_entity.name, target))
            })
            .collect();
        if fields.is_empty() {
            return Ok(());
        }

        if mapper.config().storage_version.writes_child_keys() {
            if let Some(mut record) = self.datastore.get(&parent)? {
                let mut changed = false;
                for (_, field) in &fields {
                    let store = ForeignKeyStore::new(mapper, self.datastore, field)?;
                    let mut keys = store.stored_child_keys(&record)?;
                    let before = keys.len();
                    keys.retain(|k| k != key);
                    if keys.len() == before {
                        continue;
                    }
                    if field.relation.is_ordered() {
                        for (position, survivor) in keys.iter().enumerate() {
                            self.reposition_key(survivor, field, position)?;
                        }
                    }
                    record.set_property(field.column_name(), keys);
                    changed = true;
                }
                if changed {
                    debug!(parent = %parent, child = %key, "removed child from key list");
                    self.datastore.put(record)?;
                }
            }
        }

        if let Some(owner_id) = self.objects.find_by_key(&parent) {
            for (number, _) in &fields {
                let remaining = match self.objects.field_at(owner_id, *number)? {
                    FieldValue::Collection(ids) if ids.contains(&child) => FieldValue::Collection(
                        ids.iter().copied().filter(|id| *id != child).collect(),
                    ),
                    FieldValue::Reference(id) if *id == child => FieldValue::Null,
                    _ => continue,
                };
                self.objects.set_loaded(owner_id, *number, remaining)?;
            }
        }
        Ok(())
    }

    fn delete_record(&mut self, key: &Key) -> Result<(), Error> {
        let mapper = self.mapper;
        if let Some(record) = self.datastore.get(key)? {
            if let Some(entity) = mapper.catalog().entity_for_kind(record.kind()) {
                for field in entity.fields.iter().filter(|f| f.relation.is_owner_side()) {
                    let store = ForeignKeyStore::new(self.mapper, self.datastore, field)?;
                    for child in store.child_keys(&record)? {
                        self.delete_record(&child)?;
                    }
                }
            }
        }
        self.datastore.delete(key)?;
        if let Some(id) = self.objects.find_by_key(key) {
            self.objects.mark_deleted(id)?;
        }
        debug!(key = %key, "deleted record");
        Ok(())
    }

    /// Insert the new children of each relation write and store the owner's
    /// key lists.
    fn write_relations(
        &mut self,
        entity: &'a EntityDef,
        mut owner: Record,
        writes: Vec<RelationWrite>,
    ) -> Result<(), Error> {
        let mut rewrite = false;
        for write in &writes {
            let field = relation_field(entity, write)?;
            let keys = self.attach_children(entity, &owner.key, field, write)?;
            if self.mapper.config().storage_version.writes_child_keys() {
                owner.set_property(field.column_name(), keys);
                rewrite = true;
            }
        }
        if rewrite {
            debug!(key = %owner.key, "writing child key lists");
            self.datastore.put(owner)?;
        }
        Ok(())
    }

    /// Make the children of one relation write stored children of `owner`.
    /// Returns their keys in relation order.
    fn attach_children(
        &mut self,
        entity: &EntityDef,
        owner: &Key,
        field: &FieldDef,
        write: &RelationWrite,
    ) -> Result<Vec<Key>, Error> {
        let store = ForeignKeyStore::new(self.mapper, self.datastore, field)?;
        let mut keys = Vec::with_capacity(write.children.len());

        for (position, child) in write.children.iter().copied().enumerate() {
            if store.validate_element_for_writing(&self.objects, child)? {
                self.keys.register_parent_key(child, owner.clone());
                if !field.relation.is_bidirectional() {
                    self.objects.set_associated(
                        child,
                        AssociatedSlot::ForeignKey {
                            owner: entity.name.clone(),
                            field: field.name.clone(),
                        },
                        FieldValue::Key(owner.clone()),
                    )?;
                }
                if field.relation.is_ordered() {
                    self.objects.set_associated(
                        child,
                        AssociatedSlot::Ordinal {
                            owner: entity.name.clone(),
                            field: field.name.clone(),
                        },
                        FieldValue::Long(position as i64),
                    )?;
                }
                if self.insert_object(child)? == InsertOutcome::Delayed {
                    return Err(Error::Internal(format!(
                        "child {child} of {} was not written",
                        field.name
                    )));
                }
            } else if field.relation.is_ordered() {
                self.reposition_child(child, field, position)?;
            }

            let key = self
                .objects
                .key_of(child)
                .cloned()
                .ok_or_else(|| Error::Mapping(format!("child {child} of {} has no key", field.name)))?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Rewrite the stored list position of an already stored child.
    fn reposition_child(&mut self, child: ObjectId, field: &FieldDef, position: usize) -> Result<(), Error> {
        match self.objects.key_of(child).cloned() {
            Some(key) => self.reposition_key(&key, field, position),
            None => Ok(()),
        }
    }

    fn reposition_key(&self, key: &Key, field: &FieldDef, position: usize) -> Result<(), Error> {
        let property = ordinal_property(field);
        let position = Value::Int64(position as i64);
        if let Some(mut record) = self.datastore.get(key)? {
            if record.property(&property) != Some(&position) {
                record.set_property(property, position);
                self.datastore.put(record)?;
            }
        }
        Ok(())
    }
}

/// Reject a relation write that lists the same child more than once.
fn check_distinct(entity: &EntityDef, writes: &[RelationWrite]) -> Result<(), Error> {
    for write in writes {
        let mut seen = HashSet::new();
        if let Some(repeated) = write.children.iter().find(|child| !seen.insert(**child)) {
            let field = relation_field(entity, write)?;
            return Err(Error::Mapping(format!(
                "object {repeated} appears more than once in {}.{}",
                entity.name, field.name
            )));
        }
    }
    Ok(())
}

fn relation_field<'e>(entity: &'e EntityDef, write: &RelationWrite) -> Result<&'e FieldDef, Error> {
    entity.field(write.field).ok_or_else(|| {
        Error::Internal(format!("{} has no field number {}", entity.name, write.field))
    })
}

/// Value of a primary-key field for a stored key.
fn key_field_value(field: &FieldDef, key: &Key) -> Result<FieldValue, Error> {
    match field.field_type.scalar_type() {
        Some(ScalarType::String) => Ok(FieldValue::String(key.to_encoded()?)),
        _ => Ok(FieldValue::Key(key.clone())),
    }
}
