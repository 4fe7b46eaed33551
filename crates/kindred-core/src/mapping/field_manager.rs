//! Field-by-field conversion between a managed object and its record.

use super::consumer::MappingConsumer;
use super::registry::KeyRegistry;
use crate::catalog::{EntityDef, FieldDef, FieldRole, FieldType, ScalarType};
use crate::convert;
use crate::error::Error;
use crate::mapper::Mapper;
use crate::object::{default_value, AssociatedSlot, ExecutionContext, FieldValue, ObjectId};
use crate::relation::RelationResolver;
use kindred_proto::{Key, Record, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Which fields resolve against which entity definition.
///
/// The top frame describes the object itself; entering an embedded field
/// pushes a frame for the embeddable type.
#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    /// Field that led into this frame, `None` for the object itself.
    via: Option<&'a FieldDef>,
    entity: &'a EntityDef,
    overrides: Option<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Insert,
    Update,
    Read,
}

/// Children an owner's relation field points at, to be written after the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationWrite {
    /// Relation field number on the owner.
    pub field: usize,
    /// Child objects in field order.
    pub children: Vec<ObjectId>,
}

/// Converts one object's fields to and from one record.
///
/// A field manager lives for a single insert, update or load of a single
/// object. Field numbers resolve against the innermost frame.
pub struct FieldManager<'a> {
    mapper: &'a Mapper,
    object: ObjectId,
    record: Record,
    frames: Vec<Frame<'a>>,
    mode: Mode,
    consumer: MappingConsumer,
    relation_writes: Vec<RelationWrite>,
}

impl<'a> FieldManager<'a> {
    /// Field manager for inserting a new object. The record starts with an
    /// incomplete key of the entity's kind.
    pub fn for_insert(mapper: &'a Mapper, object: ObjectId, entity: &'a EntityDef) -> Self {
        let consumer = MappingConsumer::for_insert(mapper.catalog(), entity);
        let record = Record::new(Key::incomplete(entity.kind.clone()));
        Self::with_record(mapper, object, entity, record, Mode::Insert, consumer)
    }

    /// Field manager for writing the changed fields of a stored object.
    pub fn for_update(
        mapper: &'a Mapper,
        object: ObjectId,
        entity: &'a EntityDef,
        record: Record,
        dirty: &[usize],
    ) -> Result<Self, Error> {
        check_kind(entity, &record)?;
        let consumer = MappingConsumer::for_update(entity, dirty);
        Ok(Self::with_record(mapper, object, entity, record, Mode::Update, consumer))
    }

    /// Field manager for loading an object from a record.
    pub fn for_read(
        mapper: &'a Mapper,
        object: ObjectId,
        entity: &'a EntityDef,
        record: Record,
    ) -> Result<Self, Error> {
        check_kind(entity, &record)?;
        let consumer = MappingConsumer::for_update(entity, &[]);
        Ok(Self::with_record(mapper, object, entity, record, Mode::Read, consumer))
    }

    fn with_record(
        mapper: &'a Mapper,
        object: ObjectId,
        entity: &'a EntityDef,
        record: Record,
        mode: Mode,
        consumer: MappingConsumer,
    ) -> Self {
        Self {
            mapper,
            object,
            record,
            frames: vec![Frame {
                via: None,
                entity,
                overrides: None,
            }],
            mode,
            consumer,
            relation_writes: Vec::new(),
        }
    }

    /// The record as built so far.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Take the record.
    pub fn into_record(self) -> Record {
        self.record
    }

    /// The mappings this write covers.
    pub fn consumer(&self) -> &MappingConsumer {
        &self.consumer
    }

    /// Relation children collected while storing fields.
    pub fn take_relation_writes(&mut self) -> Vec<RelationWrite> {
        std::mem::take(&mut self.relation_writes)
    }

    fn frame(&self) -> Result<Frame<'a>, Error> {
        self.frames
            .last()
            .copied()
            .ok_or_else(|| Error::Internal("field manager has no active frame".to_string()))
    }

    fn field(&self, number: usize) -> Result<&'a FieldDef, Error> {
        let frame = self.frame()?;
        frame.entity.field(number).ok_or_else(|| {
            Error::Internal(format!("{} has no field number {number}", frame.entity.name))
        })
    }

    fn property_name(&self, field: &FieldDef) -> Result<String, Error> {
        let frame = self.frame()?;
        Ok(frame
            .overrides
            .and_then(|overrides| overrides.get(&field.name))
            .cloned()
            .unwrap_or_else(|| field.column_name().to_string()))
    }

    /// Dotted path of a field from the root entity, for messages.
    fn full_field_name(&self, field: &FieldDef) -> String {
        let mut path: Vec<&str> = Vec::with_capacity(self.frames.len() + 1);
        if let Some(root) = self.frames.first() {
            path.push(&root.entity.name);
        }
        path.extend(self.frames.iter().filter_map(|f| f.via.map(|v| v.name.as_str())));
        path.push(&field.name);
        path.join(".")
    }

    // ----- read path -----

    /// Read field `number` of the active frame from the record.
    pub fn fetch_field(
        &mut self,
        relations: &mut dyn RelationResolver,
        number: usize,
    ) -> Result<FieldValue, Error> {
        let field = self.field(number)?;
        match field.role {
            FieldRole::PrimaryKey => {
                let key = self.record.key.clone();
                return self.render_key(field, Some(key));
            }
            FieldRole::Ancestor => {
                let parent = self.record.parent();
                return self.render_key(field, parent);
            }
            _ => {}
        }

        if let FieldType::Embedded(entity) = &field.field_type {
            return self.fetch_embedded(relations, field, entity);
        }
        if field.is_relation() {
            return relations.fetch_relation(&self.record, field);
        }
        self.fetch_property(field)
    }

    fn fetch_embedded(
        &mut self,
        relations: &mut dyn RelationResolver,
        field: &'a FieldDef,
        entity: &str,
    ) -> Result<FieldValue, Error> {
        let catalog = self.mapper.catalog();
        let def = catalog.require(entity)?;
        let FieldValue::Embedded(mut embedded) = default_value(catalog, &field.field_type)? else {
            return Err(Error::Internal(format!("{entity} has no default instance")));
        };

        self.frames.push(Frame {
            via: Some(field),
            entity: def,
            overrides: Some(&field.embedded_columns),
        });
        let fetched = (0..def.field_count())
            .map(|n| self.fetch_field(relations, n))
            .collect::<Result<Vec<_>, _>>();
        self.frames.pop();

        embedded.fields = fetched?;
        Ok(FieldValue::Embedded(embedded))
    }

    fn fetch_property(&self, field: &FieldDef) -> Result<FieldValue, Error> {
        let property = self.property_name(field)?;
        let raw = self.record.property(&property).unwrap_or(&Value::Null);

        let value = if field.is_serialized() {
            match raw {
                Value::Null => FieldValue::Null,
                Value::Bytes(bytes) => self
                    .mapper
                    .serializers()
                    .for_field(field)?
                    .deserialize(bytes, &field.field_type)?,
                other => {
                    return Err(Error::Deserialization(format!(
                        "datastore value of {property} is of type {} (must be bytes)",
                        other.type_name()
                    )))
                }
            }
        } else {
            convert::from_datastore(raw, &field.field_type)?
        };

        if value.is_null() && !field.field_type.is_nullable() {
            return Err(Error::NullAssignment {
                kind: self.record.kind().to_string(),
                key: self.record.key.to_string(),
                property,
                field: self.full_field_name(field),
            });
        }
        Ok(value)
    }

    fn render_key(&self, field: &FieldDef, key: Option<Key>) -> Result<FieldValue, Error> {
        match field.field_type.scalar_type() {
            Some(ScalarType::Key) => Ok(key.map(FieldValue::Key).unwrap_or(FieldValue::Null)),
            Some(ScalarType::String) => match key {
                Some(key) => Ok(FieldValue::String(key.to_encoded()?)),
                None => Ok(FieldValue::Null),
            },
            _ => Err(self.unexpected_key_type(field)),
        }
    }

    fn unexpected_key_type(&self, field: &FieldDef) -> Error {
        let what = match field.role {
            FieldRole::PrimaryKey => "Primary key",
            _ => "Ancestor key",
        };
        Error::Internal(format!(
            "{what} {} is of unexpected type {} (must be string or key)",
            self.full_field_name(field),
            field.field_type.type_name()
        ))
    }

    // ----- write path -----

    /// Write field `number` of the active frame into the record.
    pub fn store_field(&mut self, number: usize, value: &FieldValue) -> Result<(), Error> {
        let field = self.field(number)?;
        match field.role {
            FieldRole::PrimaryKey => return self.store_primary_key(field, value),
            FieldRole::Ancestor => return self.store_ancestor(field, value),
            _ => {}
        }

        if let FieldType::Embedded(entity) = &field.field_type {
            return self.store_embedded(field, entity, value);
        }
        if field.is_relation() {
            self.store_relation(number, field, value);
            return Ok(());
        }

        let property = self.property_name(field)?;
        let stored = if value.is_null() {
            Value::Null
        } else if field.is_serialized() {
            Value::Bytes(self.mapper.serializers().for_field(field)?.serialize(value)?)
        } else {
            convert::to_datastore(value, &field.field_type)?
        };
        self.record.set_property(property, stored);
        Ok(())
    }

    fn key_from_value(&self, field: &FieldDef, value: &FieldValue) -> Result<Option<Key>, Error> {
        match (field.field_type.scalar_type(), value) {
            (_, FieldValue::Null) => Ok(None),
            (Some(ScalarType::Key), FieldValue::Key(key)) => Ok(Some(key.clone())),
            (Some(ScalarType::String), FieldValue::String(encoded)) => {
                if field.is_primary_key() {
                    // an unencoded string names the record
                    Ok(Some(Key::from_encoded(encoded).unwrap_or_else(|_| {
                        Key::from_name(self.record.kind().to_string(), encoded.clone())
                    })))
                } else {
                    Key::from_encoded(encoded)
                        .map(Some)
                        .map_err(|_| Error::InvalidAncestor {
                            field: self.full_field_name(field),
                            value: encoded.clone(),
                        })
                }
            }
            (Some(ScalarType::Key | ScalarType::String), other) => Err(Error::TypeConversion {
                expected: field.field_type.type_name(),
                found: other.type_name().to_string(),
            }),
            _ => Err(self.unexpected_key_type(field)),
        }
    }

    fn store_primary_key(&mut self, field: &FieldDef, value: &FieldValue) -> Result<(), Error> {
        let key = self.key_from_value(field, value)?;
        if self.record.key.is_complete() {
            // only a no-op write is allowed
            if key.as_ref() != Some(&self.record.key) {
                return Err(Error::ImmutablePrimaryKey {
                    class: self.frame()?.entity.name.clone(),
                    key: self.record.key.to_string(),
                });
            }
            return Ok(());
        }
        let Some(mut key) = key else {
            return Ok(());
        };
        if key.kind() != self.record.kind() {
            return Err(Error::Mapping(format!(
                "key {key} cannot identify a record of kind {}",
                self.record.kind()
            )));
        }
        if !key.has_parent() {
            if let Some(parent) = self.record.parent() {
                key = key.with_parent(&parent)?;
            }
        }
        self.record.key = key;
        Ok(())
    }

    fn store_ancestor(&mut self, field: &FieldDef, value: &FieldValue) -> Result<(), Error> {
        let key = self.key_from_value(field, value)?;
        match (self.record.parent(), key) {
            (Some(existing), key) => {
                // only a no-op write is allowed
                if key.as_ref() != Some(&existing) {
                    return Err(self.immutable_ancestor());
                }
                Ok(())
            }
            (None, Some(parent)) => {
                if self.mode != Mode::Insert {
                    return Err(self.immutable_ancestor());
                }
                self.rebuild_with_parent(&parent)
            }
            // an ancestor field does not require every instance to have a parent
            (None, None) => Ok(()),
        }
    }

    fn immutable_ancestor(&self) -> Error {
        Error::ImmutableAncestor {
            class: self
                .frames
                .first()
                .map(|f| f.entity.name.clone())
                .unwrap_or_default(),
            key: self.record.key.to_string(),
        }
    }

    fn store_embedded(
        &mut self,
        field: &'a FieldDef,
        entity: &str,
        value: &FieldValue,
    ) -> Result<(), Error> {
        let catalog = self.mapper.catalog();
        let def = catalog.require(entity)?;
        let embedded = match value {
            FieldValue::Embedded(embedded) => embedded.clone(),
            // a missing embedded object is written as a default instance
            FieldValue::Null => match default_value(catalog, &field.field_type)? {
                FieldValue::Embedded(embedded) => embedded,
                _ => return Err(Error::Internal(format!("{entity} has no default instance"))),
            },
            other => {
                return Err(Error::TypeConversion {
                    expected: field.field_type.type_name(),
                    found: other.type_name().to_string(),
                })
            }
        };

        self.frames.push(Frame {
            via: Some(field),
            entity: def,
            overrides: Some(&field.embedded_columns),
        });
        let stored = embedded
            .fields
            .iter()
            .enumerate()
            .try_for_each(|(n, value)| self.store_field(n, value));
        self.frames.pop();
        stored
    }

    fn store_relation(&mut self, number: usize, field: &FieldDef, value: &FieldValue) {
        // a back reference is expressed through the record's parent key
        if !field.relation.is_owner_side() {
            return;
        }
        let children = match value {
            FieldValue::Collection(ids) => ids.clone(),
            FieldValue::Reference(id) => vec![*id],
            _ => Vec::new(),
        };
        self.relation_writes.push(RelationWrite {
            field: number,
            children,
        });
    }

    fn rebuild_with_parent(&mut self, parent: &Key) -> Result<(), Error> {
        self.record = self.record.rebuild_with_parent(parent)?;
        debug!(
            object = %self.object,
            key = %self.record.key,
            "rebuilt record with parent"
        );
        Ok(())
    }

    // ----- entity groups and deferred writes -----

    /// Give the record a parent key if it has none, trying in order: a key
    /// registered for this object, an external foreign key, and the field
    /// referencing the parent object.
    ///
    /// When the entity declares an ancestor field, the field is synchronized
    /// with the resolved key and its new value returned.
    pub fn establish_entity_group(
        &mut self,
        ctx: &mut ExecutionContext,
        registry: &mut KeyRegistry,
    ) -> Result<Option<FieldValue>, Error> {
        if self.record.key.has_parent() {
            return Ok(None);
        }

        let mut parent = registry.take_parent_key(self.object);
        if parent.is_none() {
            parent = self.parent_from_foreign_keys(ctx);
        }
        if parent.is_none() {
            parent = self.parent_from_provider(ctx)?;
        }
        let Some(parent) = parent else {
            return Ok(None);
        };

        self.rebuild_with_parent(&parent)?;

        let entity = self.frame()?.entity;
        match entity.ancestor_field() {
            Some((number, field)) => {
                let value = self.render_key(field, Some(parent))?;
                ctx.set_loaded(self.object, number, value.clone())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn parent_from_foreign_keys(&self, ctx: &ExecutionContext) -> Option<Key> {
        self.consumer.foreign_keys().find_map(|mapping| {
            let slot = AssociatedSlot::ForeignKey {
                owner: mapping.owner.clone(),
                field: mapping.field.clone(),
            };
            match ctx.associated(self.object, &slot)? {
                FieldValue::Key(key) => Some(key.clone()),
                FieldValue::Reference(owner) => ctx.key_of(*owner).cloned(),
                _ => None,
            }
        })
    }

    fn parent_from_provider(&self, ctx: &ExecutionContext) -> Result<Option<Key>, Error> {
        let entity = self.frame()?.entity;
        let Some((number, field)) = entity.ancestor_provider() else {
            return Ok(None);
        };
        match ctx.field_at(self.object, number)? {
            FieldValue::Null => Ok(None),
            FieldValue::Reference(parent) => match ctx.key_of(*parent) {
                Some(key) => Ok(Some(key.clone())),
                None => Err(Error::Mapping(format!(
                    "{} refers to object {parent}, which has not been written",
                    self.full_field_name(field)
                ))),
            },
            other => Err(Error::TypeConversion {
                expected: field.field_type.type_name(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Copy list positions supplied for this object into the record.
    ///
    /// Returns `true` when the object is an element of an ordered list but no
    /// position is available yet, in which case the write must wait.
    pub fn handle_index_fields(&mut self, ctx: &ExecutionContext) -> Result<bool, Error> {
        let mut expected = false;
        let mut positions = Vec::new();
        for mapping in self.consumer.ordinals() {
            expected = true;
            let slot = AssociatedSlot::Ordinal {
                owner: mapping.owner.clone(),
                field: mapping.field.clone(),
            };
            if let (Some(value), crate::catalog::ExternalMappingKind::Ordinal { property }) =
                (ctx.associated(self.object, &slot), &mapping.kind)
            {
                positions.push((property.clone(), convert::natural(value)?));
            }
        }
        let delay = expected && positions.is_empty();
        for (property, value) in positions {
            self.record.set_property(property, value);
        }
        Ok(delay)
    }
}

fn check_kind(entity: &EntityDef, record: &Record) -> Result<(), Error> {
    if record.kind() != entity.kind {
        return Err(Error::Mapping(format!(
            "object is of kind {} but key {} is of kind {}",
            entity.kind,
            record.key,
            record.kind()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldDef};
    use crate::config::MapperConfig;
    use crate::object::EmbeddedValue;
    use kindred_proto::KeyId;

    struct NoRelations;

    impl RelationResolver for NoRelations {
        fn fetch_relation(&mut self, _: &Record, _: &FieldDef) -> Result<FieldValue, Error> {
            Ok(FieldValue::Null)
        }
    }

    fn mapper() -> Mapper {
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
                    .with_field(FieldDef::ancestor("group", ScalarType::String))
                    .with_field(FieldDef::new("age", FieldType::Scalar(ScalarType::Int32)))
                    .with_field(FieldDef::embedded("name", "Name"))
                    .with_field(
                        FieldDef::embedded("alias", "Name").with_embedded_column("first", "alias_first"),
                    )
                    .with_field(
                        FieldDef::optional("notes", ScalarType::String)
                            .serialized_with("json"),
                    ),
            )
            .unwrap();
        Mapper::new(catalog, MapperConfig::default()).unwrap()
    }

    fn person(mapper: &Mapper) -> &EntityDef {
        mapper.catalog().entity("Person").unwrap()
    }

    #[test]
    fn test_embedded_fields_use_overrides() {
        let mapper = mapper();
        let mut fm = FieldManager::for_insert(&mapper, ObjectId(1), person(&mapper));
        let name = FieldValue::Embedded(EmbeddedValue::new(
            "Name",
            vec![FieldValue::String("Ada".into()), FieldValue::Char('A')],
        ));
        fm.store_field(3, &name).unwrap();
        fm.store_field(4, &name).unwrap();

        let record = fm.into_record();
        assert_eq!(record.property("first"), Some(&Value::String("Ada".into())));
        assert_eq!(record.property("alias_first"), Some(&Value::String("Ada".into())));
        assert_eq!(record.property("initial"), Some(&Value::Int64('A' as i64)));
    }

    #[test]
    fn test_null_embedded_written_as_default() {
        let mapper = mapper();
        let mut fm = FieldManager::for_insert(&mapper, ObjectId(1), person(&mapper));
        fm.store_field(3, &FieldValue::Null).unwrap();
        let record = fm.into_record();
        assert_eq!(record.property("first"), Some(&Value::Null));
        assert_eq!(record.property("initial"), Some(&Value::Int64(0)));
    }

    #[test]
    fn test_embedded_read_synthesizes_instance() {
        let mapper = mapper();
        let record = Record::new(Key::from_id("Person", 1))
            .with_property("age", 3)
            .with_property("initial", 66i64);
        let mut fm = FieldManager::for_read(&mapper, ObjectId(1), person(&mapper), record).unwrap();

        let name = fm.fetch_field(&mut NoRelations, 3).unwrap();
        assert_eq!(
            name,
            FieldValue::Embedded(EmbeddedValue::new(
                "Name",
                vec![FieldValue::Null, FieldValue::Char('B')]
            ))
        );
        assert_eq!(fm.fetch_field(&mut NoRelations, 2).unwrap(), FieldValue::Int(3));
    }

    #[test]
    fn test_null_assignment_names_the_field() {
        let mapper = mapper();
        let record = Record::new(Key::from_id("Person", 1)).with_property("age", Value::Null);
        let mut fm = FieldManager::for_read(&mapper, ObjectId(1), person(&mapper), record).unwrap();

        match fm.fetch_field(&mut NoRelations, 2) {
            Err(Error::NullAssignment { kind, property, field, .. }) => {
                assert_eq!(kind, "Person");
                assert_eq!(property, "age");
                assert_eq!(field, "Person.age");
            }
            other => panic!("expected null assignment, got {other:?}"),
        }

        // the frame stack unwinds even when an embedded read fails
        match fm.fetch_field(&mut NoRelations, 4) {
            Err(Error::NullAssignment { field, .. }) => assert_eq!(field, "Person.alias.initial"),
            other => panic!("expected null assignment, got {other:?}"),
        }
        assert_eq!(fm.frames.len(), 1);
    }

    #[test]
    fn test_primary_key_is_immutable() {
        let mapper = mapper();
        let key = Key::from_id("Person", 5);
        let record = Record::new(key.clone());
        let mut fm =
            FieldManager::for_update(&mapper, ObjectId(1), person(&mapper), record, &[0]).unwrap();

        fm.store_field(0, &FieldValue::Key(key.clone())).unwrap();
        let err = fm
            .store_field(0, &FieldValue::Key(Key::from_id("Person", 6)))
            .unwrap_err();
        assert!(matches!(err, Error::ImmutablePrimaryKey { .. }));
        assert_eq!(fm.record().key, key);
    }

    #[test]
    fn test_ancestor_field_sets_parent_on_insert() {
        let mapper = mapper();
        let parent = Key::from_id("Group", 9);
        let mut fm = FieldManager::for_insert(&mapper, ObjectId(1), person(&mapper));
        fm.store_field(1, &FieldValue::String(parent.to_encoded().unwrap()))
            .unwrap();
        assert_eq!(fm.record().parent(), Some(parent.clone()));

        let err = fm
            .store_field(1, &FieldValue::String(Key::from_id("Group", 10).to_encoded().unwrap()))
            .unwrap_err();
        assert!(matches!(err, Error::ImmutableAncestor { .. }));
    }

    #[test]
    fn test_unconvertible_ancestor_rejected() {
        let mapper = mapper();
        let mut fm = FieldManager::for_insert(&mapper, ObjectId(1), person(&mapper));
        let err = fm
            .store_field(1, &FieldValue::String("not a key".into()))
            .unwrap_err();
        match err {
            Error::InvalidAncestor { value, .. } => assert_eq!(value, "not a key"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_keys_render_per_declared_type() {
        let mapper = mapper();
        let parent = Key::from_id("Group", 2);
        let key = parent.child("Person", KeyId::Id(4)).unwrap();
        let record = Record::new(key.clone());
        let mut fm = FieldManager::for_read(&mapper, ObjectId(1), person(&mapper), record).unwrap();

        assert_eq!(fm.fetch_field(&mut NoRelations, 0).unwrap(), FieldValue::Key(key));
        assert_eq!(
            fm.fetch_field(&mut NoRelations, 1).unwrap(),
            FieldValue::String(parent.to_encoded().unwrap())
        );
    }

    #[test]
    fn test_serialized_field() {
        let mapper = mapper();
        let mut fm = FieldManager::for_insert(&mapper, ObjectId(1), person(&mapper));
        fm.store_field(5, &FieldValue::String("hello".into())).unwrap();
        let record = fm.into_record();
        assert!(matches!(record.property("notes"), Some(Value::Bytes(_))));

        let mut fm = FieldManager::for_read(&mapper, ObjectId(1), person(&mapper), record).unwrap();
        assert_eq!(
            fm.fetch_field(&mut NoRelations, 5).unwrap(),
            FieldValue::String("hello".into())
        );
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mapper = mapper();
        let record = Record::new(Key::from_id("Book", 1));
        assert!(FieldManager::for_read(&mapper, ObjectId(1), person(&mapper), record).is_err());
    }
}
