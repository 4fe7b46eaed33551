//! Lookup of the children an owner holds through an owned relation.

use crate::catalog::{ordinal_property, EntityDef, FieldDef};
use crate::error::Error;
use crate::mapper::Mapper;
use crate::object::{ExecutionContext, Lifecycle, ObjectId};
use crate::storage::{Datastore, FilterEvaluator};
use kindred_proto::{DatastoreQuery, FetchOptions, FilterPredicate, Key, Record, SortPredicate, Value};
use tracing::{debug, warn};

/// Children of one relation field, read from the datastore.
///
/// Children live below their owner's key. Depending on the storage version
/// they are found either through the key list stored on the owner or by an
/// ancestor query filtered to direct children.
pub struct ForeignKeyStore<'a> {
    mapper: &'a Mapper,
    datastore: &'a dyn Datastore,
    field: &'a FieldDef,
    target: &'a EntityDef,
}

impl<'a> ForeignKeyStore<'a> {
    /// Create a store for an owner-side relation field.
    pub fn new(
        mapper: &'a Mapper,
        datastore: &'a dyn Datastore,
        field: &'a FieldDef,
    ) -> Result<Self, Error> {
        let target = match field.relation.target() {
            Some(target) if field.relation.is_owner_side() => mapper.catalog().require(target)?,
            _ => {
                return Err(Error::Mapping(format!(
                    "{} does not own the records it refers to",
                    field.name
                )))
            }
        };
        Ok(Self {
            mapper,
            datastore,
            field,
            target,
        })
    }

    /// Entity of the children.
    pub fn target(&self) -> &'a EntityDef {
        self.target
    }

    fn uses_key_list(&self) -> bool {
        self.mapper.config().storage_version.reads_child_keys()
    }

    /// Keys stored in the owner's child key list. A missing list is empty.
    pub fn stored_child_keys(&self, owner: &Record) -> Result<Vec<Key>, Error> {
        match owner.property(self.field.column_name()) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::KeyArray(keys)) => Ok(keys.clone()),
            Some(other) => Err(Error::TypeConversion {
                expected: "key list".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Keys of the owner's children, in relation order.
    pub fn child_keys(&self, owner: &Record) -> Result<Vec<Key>, Error> {
        if self.uses_key_list() {
            return self.stored_child_keys(owner);
        }
        let mut query = self.ancestor_query(owner, &[], &[]);
        if !self.field.relation.is_ordered() {
            query = query.keys_only();
        }
        self.run_direct_children(owner, &query)
            .map(|records| records.into_iter().map(|r| r.key).collect())
    }

    /// The owner's children.
    ///
    /// With a stored key list the children come back in list order and
    /// `filters` and `sorts` are not applied. Otherwise they are pushed into
    /// the ancestor query; an ordered relation without explicit sorts comes
    /// back in element position order, sorted after the direct children are
    /// selected.
    pub fn children(
        &self,
        owner: &Record,
        filters: &[FilterPredicate],
        sorts: &[SortPredicate],
    ) -> Result<Vec<Record>, Error> {
        if !self.uses_key_list() {
            let query = self.ancestor_query(owner, filters, sorts);
            return self.run_direct_children(owner, &query);
        }

        let keys = self.stored_child_keys(owner)?;
        let mut found = self.datastore.get_many(&keys)?;
        keys.iter()
            .map(|key| {
                found.remove(key).ok_or_else(|| {
                    warn!(
                        field = %self.field.name,
                        parent = %owner.key,
                        child = %key,
                        "child key list refers to a missing record"
                    );
                    Error::DataIntegrity {
                        field: self.field.name.clone(),
                        parent: owner.key.to_string(),
                        child: key.to_string(),
                    }
                })
            })
            .collect()
    }

    /// Number of children.
    pub fn size(&self, owner: &Record) -> Result<usize, Error> {
        if self.uses_key_list() {
            return Ok(self.stored_child_keys(owner)?.len());
        }
        Ok(self.child_keys(owner)?.len())
    }

    /// Check whether `element` is one of the owner's children.
    ///
    /// Objects that are not stored, or not of the target entity, are never
    /// contained.
    pub fn contains(
        &self,
        ctx: &ExecutionContext,
        owner: &Record,
        element: ObjectId,
    ) -> Result<bool, Error> {
        if !self.validate_element_for_reading(ctx, element) {
            return Ok(false);
        }
        let Some(key) = ctx.key_of(element) else {
            return Ok(false);
        };
        if self.uses_key_list() {
            return Ok(self.stored_child_keys(owner)?.contains(key));
        }
        Ok(key.parent().as_ref() == Some(&owner.key))
    }

    /// Check whether `element` is an instance of the target entity.
    pub fn validate_element_type(&self, ctx: &ExecutionContext, element: ObjectId) -> bool {
        ctx.entity_of(element)
            .map(|entity| {
                self.mapper
                    .catalog()
                    .is_assignable(&entity.name, &self.target.name)
            })
            .unwrap_or(false)
    }

    /// Check whether `element` can be looked up among stored children.
    pub fn validate_element_for_reading(&self, ctx: &ExecutionContext, element: ObjectId) -> bool {
        matches!(
            ctx.lifecycle(element),
            Some(Lifecycle::Persistent | Lifecycle::Detached)
        ) && self.validate_element_type(ctx, element)
    }

    /// Check that `element` may be written as a child.
    ///
    /// Returns `true` when the element has not been stored yet.
    pub fn validate_element_for_writing(
        &self,
        ctx: &ExecutionContext,
        element: ObjectId,
    ) -> Result<bool, Error> {
        let entity = ctx.entity_of(element)?;
        if !self
            .mapper
            .catalog()
            .is_assignable(&entity.name, &self.target.name)
        {
            return Err(Error::TypeConversion {
                expected: self.target.name.clone(),
                found: entity.name.clone(),
            });
        }
        Ok(ctx.lifecycle(element) == Some(Lifecycle::Transient))
    }

    fn ancestor_query(
        &self,
        owner: &Record,
        filters: &[FilterPredicate],
        sorts: &[SortPredicate],
    ) -> DatastoreQuery {
        let mut query = DatastoreQuery::new(self.target.kind.clone()).with_ancestor(owner.key.clone());
        query.filters.extend_from_slice(filters);
        query.sorts.extend_from_slice(sorts);
        query
    }

    fn run_direct_children(
        &self,
        owner: &Record,
        query: &DatastoreQuery,
    ) -> Result<Vec<Record>, Error> {
        debug!(
            field = %self.field.name,
            parent = %owner.key,
            kind = %query.kind,
            "querying children"
        );
        let mut children = Vec::new();
        for record in self.datastore.run_query(query, &FetchOptions::default())? {
            let record = record?;
            // descendants further down belong to other relations
            if record.parent().as_ref() == Some(&owner.key) {
                children.push(record);
            }
        }
        // a pushed-down position sort would have to follow any inequality property
        if query.sorts.is_empty() && self.field.relation.is_ordered() {
            let by_position = [SortPredicate::asc(ordinal_property(self.field))];
            FilterEvaluator::sort_records(&mut children, &by_position);
        }
        Ok(children)
    }
}
