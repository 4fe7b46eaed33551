//! Managed object state.

use super::value::{EmbeddedValue, FieldValue, ObjectId};
use crate::catalog::{Catalog, EntityDef, FieldType, ScalarType};
use crate::error::Error;
use kindred_proto::Key;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created but never written.
    Transient,
    /// Written or loaded, and managed by this context.
    Persistent,
    /// Has a key but is no longer managed.
    Detached,
    /// Deleted from the datastore.
    Deleted,
}

/// Slot for a value the framework tracks on an object on behalf of another
/// entity's relation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssociatedSlot {
    /// The owner key of a unidirectional relation.
    ForeignKey {
        /// Owning entity.
        owner: String,
        /// Relation field on the owner.
        field: String,
    },
    /// The element position in an owner's ordered list.
    Ordinal {
        /// Owning entity.
        owner: String,
        /// Relation field on the owner.
        field: String,
    },
}

/// State of one managed object.
#[derive(Debug, Clone)]
pub struct ObjectState {
    entity: String,
    fields: Vec<FieldValue>,
    key: Option<Key>,
    lifecycle: Lifecycle,
    dirty: BTreeSet<usize>,
    associated: BTreeMap<AssociatedSlot, FieldValue>,
}

impl ObjectState {
    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Field values by field number.
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Key assigned by the datastore, once written or loaded.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

/// The framework-side view of a unit of work: every domain object it
/// manages, addressed by [`ObjectId`].
pub struct ExecutionContext {
    catalog: Arc<Catalog>,
    objects: HashMap<ObjectId, ObjectState>,
    by_key: HashMap<Key, ObjectId>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            objects: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// The catalog describing managed objects.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create a transient object with default field values.
    pub fn create(&mut self, entity: &str) -> Result<ObjectId, Error> {
        let def = self.catalog.require(entity)?;
        if def.embeddable {
            return Err(Error::Mapping(format!(
                "{entity} is embeddable and cannot be managed on its own"
            )));
        }
        let fields = default_fields(&self.catalog, def)?;
        let id = ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(
            id,
            ObjectState {
                entity: entity.to_string(),
                fields,
                key: None,
                lifecycle: Lifecycle::Transient,
                dirty: BTreeSet::new(),
                associated: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    /// Build a default instance of an embeddable type.
    pub fn new_embedded(&self, entity: &str) -> Result<EmbeddedValue, Error> {
        let def = self.catalog.require(entity)?;
        Ok(EmbeddedValue::new(entity, default_fields(&self.catalog, def)?))
    }

    /// Check whether this context manages the object, in any lifecycle state.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of objects in the context.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check whether the context is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get an object's state.
    pub fn object(&self, id: ObjectId) -> Option<&ObjectState> {
        self.objects.get(&id)
    }

    /// Get an object's state, failing if the context does not manage it.
    pub fn require(&self, id: ObjectId) -> Result<&ObjectState, Error> {
        self.objects
            .get(&id)
            .ok_or_else(|| Error::Mapping(format!("object {id} is not managed by this context")))
    }

    fn require_mut(&mut self, id: ObjectId) -> Result<&mut ObjectState, Error> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| Error::Mapping(format!("object {id} is not managed by this context")))
    }

    /// Entity definition of a managed object.
    pub fn entity_of(&self, id: ObjectId) -> Result<&EntityDef, Error> {
        let entity = &self.require(id)?.entity;
        self.catalog.require(entity)
    }

    /// Lifecycle state of an object, or `None` if this context does not manage it.
    pub fn lifecycle(&self, id: ObjectId) -> Option<Lifecycle> {
        self.objects.get(&id).map(|o| o.lifecycle)
    }

    /// Key of a written or loaded object.
    pub fn key_of(&self, id: ObjectId) -> Option<&Key> {
        self.objects.get(&id).and_then(|o| o.key.as_ref())
    }

    /// Find the managed object loaded or written under a key.
    pub fn find_by_key(&self, key: &Key) -> Option<ObjectId> {
        self.by_key.get(key).copied()
    }

    /// Get a field value by name.
    pub fn get(&self, id: ObjectId, field: &str) -> Result<&FieldValue, Error> {
        let number = self.field_number(id, field)?;
        self.field_at(id, number)
    }

    /// Get a field value by number.
    pub fn field_at(&self, id: ObjectId, number: usize) -> Result<&FieldValue, Error> {
        let state = self.require(id)?;
        state.fields.get(number).ok_or_else(|| {
            Error::Internal(format!("{} has no field number {number}", state.entity))
        })
    }

    /// Set a field value by name and mark it changed.
    ///
    /// The value must conform to the field's declared type.
    pub fn set(&mut self, id: ObjectId, field: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        let value = value.into();
        let number = self.field_number(id, field)?;
        let def = self.entity_of(id)?;
        let field_def = &def.fields[number];
        if !value.conforms_to(&field_def.field_type) {
            return Err(Error::TypeConversion {
                expected: field_def.field_type.type_name(),
                found: value.type_name().to_string(),
            });
        }
        let state = self.require_mut(id)?;
        state.fields[number] = value;
        state.dirty.insert(number);
        Ok(())
    }

    /// Set a field value by number without marking it changed.
    pub(crate) fn set_loaded(&mut self, id: ObjectId, number: usize, value: FieldValue) -> Result<(), Error> {
        let state = self.require_mut(id)?;
        match state.fields.get_mut(number) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::Internal(format!(
                "{} has no field number {number}",
                state.entity
            ))),
        }
    }

    /// Numbers of fields changed since the last write or load.
    pub fn dirty_fields(&self, id: ObjectId) -> Vec<usize> {
        self.objects
            .get(&id)
            .map(|o| o.dirty.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget pending changes.
    pub fn clear_dirty(&mut self, id: ObjectId) {
        if let Some(state) = self.objects.get_mut(&id) {
            state.dirty.clear();
        }
    }

    /// Record that an object was written or loaded under `key`.
    pub fn mark_persistent(&mut self, id: ObjectId, key: Key) -> Result<(), Error> {
        let state = self.require_mut(id)?;
        state.key = Some(key.clone());
        state.lifecycle = Lifecycle::Persistent;
        self.by_key.insert(key, id);
        Ok(())
    }

    /// Stop managing an object while keeping its key.
    pub fn detach(&mut self, id: ObjectId) -> Result<(), Error> {
        let state = self.require_mut(id)?;
        state.lifecycle = Lifecycle::Detached;
        if let Some(key) = state.key.clone() {
            self.by_key.remove(&key);
        }
        Ok(())
    }

    /// Record that an object was deleted.
    pub fn mark_deleted(&mut self, id: ObjectId) -> Result<(), Error> {
        let state = self.require_mut(id)?;
        state.lifecycle = Lifecycle::Deleted;
        if let Some(key) = state.key.clone() {
            self.by_key.remove(&key);
        }
        Ok(())
    }

    /// Set a value tracked on behalf of another entity's relation.
    pub fn set_associated(&mut self, id: ObjectId, slot: AssociatedSlot, value: FieldValue) -> Result<(), Error> {
        self.require_mut(id)?.associated.insert(slot, value);
        Ok(())
    }

    /// Get a value tracked on behalf of another entity's relation.
    pub fn associated(&self, id: ObjectId, slot: &AssociatedSlot) -> Option<&FieldValue> {
        self.objects.get(&id).and_then(|o| o.associated.get(slot))
    }

    fn field_number(&self, id: ObjectId, field: &str) -> Result<usize, Error> {
        let def = self.entity_of(id)?;
        def.field_number(field).ok_or_else(|| Error::UnknownField {
            entity: def.name.clone(),
            field: field.to_string(),
        })
    }
}

/// Default value of a field of the given type.
///
/// Non-nullable scalars start at their zero value, embedded fields at a
/// default instance, collections empty and everything else null.
pub fn default_value(catalog: &Catalog, field_type: &FieldType) -> Result<FieldValue, Error> {
    Ok(match field_type {
        FieldType::Scalar(scalar) => match scalar {
            ScalarType::Bool => FieldValue::Bool(false),
            ScalarType::Int8 => FieldValue::Byte(0),
            ScalarType::Int16 => FieldValue::Short(0),
            ScalarType::Int32 => FieldValue::Int(0),
            ScalarType::Int64 => FieldValue::Long(0),
            ScalarType::Float32 => FieldValue::Float(0.0),
            ScalarType::Float64 => FieldValue::Double(0.0),
            ScalarType::Char => FieldValue::Char('\0'),
            ScalarType::String => FieldValue::String(String::new()),
            ScalarType::Bytes => FieldValue::Bytes(Vec::new()),
            ScalarType::Timestamp => FieldValue::Timestamp(0),
            ScalarType::Key | ScalarType::Enum { .. } => FieldValue::Null,
        },
        FieldType::Embedded(entity) => {
            let def = catalog.require(entity)?;
            FieldValue::Embedded(EmbeddedValue::new(entity.clone(), default_fields(catalog, def)?))
        }
        FieldType::Collection(_) => FieldValue::Collection(Vec::new()),
        _ => FieldValue::Null,
    })
}

fn default_fields(catalog: &Catalog, def: &EntityDef) -> Result<Vec<FieldValue>, Error> {
    def.fields
        .iter()
        .map(|f| default_value(catalog, &f.field_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;

    fn catalog() -> Arc<Catalog> {
        let mut catalog = Catalog::new();
        catalog
            .register(
                EntityDef::embeddable("Name")
                    .with_field(FieldDef::optional("first", ScalarType::String))
                    .with_field(FieldDef::new("initial", FieldType::Scalar(ScalarType::Char))),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Person")
                    .with_field(FieldDef::primary_key("id", ScalarType::Key))
                    .with_field(FieldDef::new("age", FieldType::Scalar(ScalarType::Int32)))
                    .with_field(FieldDef::embedded("name", "Name"))
                    .with_field(FieldDef::one_to_many("pets", "Pet")),
            )
            .unwrap();
        Arc::new(catalog)
    }

    #[test]
    fn test_create_with_defaults() {
        let mut ctx = ExecutionContext::new(catalog());
        let id = ctx.create("Person").unwrap();

        assert_eq!(ctx.lifecycle(id), Some(Lifecycle::Transient));
        assert_eq!(ctx.get(id, "id").unwrap(), &FieldValue::Null);
        assert_eq!(ctx.get(id, "age").unwrap(), &FieldValue::Int(0));
        assert_eq!(ctx.get(id, "pets").unwrap(), &FieldValue::Collection(vec![]));
        assert_eq!(
            ctx.get(id, "name").unwrap(),
            &FieldValue::Embedded(EmbeddedValue::new(
                "Name",
                vec![FieldValue::Null, FieldValue::Char('\0')]
            ))
        );
    }

    #[test]
    fn test_set_marks_dirty_and_checks_type() {
        let mut ctx = ExecutionContext::new(catalog());
        let id = ctx.create("Person").unwrap();

        ctx.set(id, "age", 42).unwrap();
        assert_eq!(ctx.dirty_fields(id), vec![1]);

        let err = ctx.set(id, "age", "forty-two").unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));

        let err = ctx.set(id, "height", 3).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));

        ctx.clear_dirty(id);
        assert!(ctx.dirty_fields(id).is_empty());
    }

    #[test]
    fn test_persistent_and_detached() {
        let mut ctx = ExecutionContext::new(catalog());
        let id = ctx.create("Person").unwrap();
        let key = Key::from_id("Person", 7);

        ctx.mark_persistent(id, key.clone()).unwrap();
        assert_eq!(ctx.find_by_key(&key), Some(id));
        assert_eq!(ctx.key_of(id), Some(&key));

        ctx.detach(id).unwrap();
        assert_eq!(ctx.lifecycle(id), Some(Lifecycle::Detached));
        assert_eq!(ctx.find_by_key(&key), None);
        assert_eq!(ctx.key_of(id), Some(&key));
    }

    #[test]
    fn test_embeddable_cannot_be_created() {
        let mut ctx = ExecutionContext::new(catalog());
        assert!(matches!(ctx.create("Name"), Err(Error::Mapping(_))));
        assert!(ctx.new_embedded("Name").is_ok());
    }

    #[test]
    fn test_objects_from_other_contexts_are_unknown() {
        let mut first = ExecutionContext::new(catalog());
        let second = ExecutionContext::new(catalog());
        let id = first.create("Person").unwrap();

        assert!(first.contains(id));
        assert!(!second.contains(id));
        assert_eq!(second.lifecycle(id), None);
    }
}
