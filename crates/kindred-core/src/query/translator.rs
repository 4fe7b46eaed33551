//! Translation of parsed queries into native datastore queries.
//!
//! The translator walks a [`QueryExpr`] and produces a [`TranslatedQuery`]:
//! the native filters, sorts and ancestor, an optional batch of keys to get
//! directly, and the shape of the result. Anything the datastore cannot
//! evaluate is rejected here, before any datastore call.

use super::expr::{AggregateFunction, Expr, Operator, OrderDirection, QueryExpr, ResultExpr};
use crate::catalog::{Catalog, EntityDef, FieldDef, FieldRole, Relation};
use crate::convert;
use crate::error::Error;
use crate::object::{ExecutionContext, FieldValue, ObjectId};
use kindred_proto::{DatastoreQuery, FilterOperator, FilterPredicate, Key, SortPredicate, KEY_PROPERTY};
use std::collections::BTreeMap;
use tracing::debug;

/// What a query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// Candidate objects.
    Objects,
    /// The number of results.
    Count,
    /// Values of these candidate field numbers, one row per result.
    Fields(Vec<usize>),
}

/// A query in the form the datastore evaluates.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    /// Candidate entity name.
    pub entity: String,
    /// Native query.
    pub query: DatastoreQuery,
    /// Keys to get directly instead of running the query. The native filters
    /// and sorts are then applied to the fetched records.
    pub batch_keys: Option<Vec<Key>>,
    /// Result shape.
    pub result: ResultShape,
}

/// A field path resolved against the candidate entity.
enum Resolved<'a> {
    PrimaryKey(&'a FieldDef),
    Ancestor(&'a FieldDef),
    Relation(&'a FieldDef),
    Embedded(&'a FieldDef),
    Property { field: &'a FieldDef, column: String },
}

/// Translates parsed queries against a catalog.
///
/// Object-valued parameters are resolved to keys through the execution
/// context, so the objects must already be stored.
pub struct QueryTranslator<'a> {
    catalog: &'a Catalog,
    objects: &'a ExecutionContext,
    parameters: &'a BTreeMap<String, FieldValue>,
}

impl<'a> QueryTranslator<'a> {
    /// Create a translator.
    pub fn new(
        catalog: &'a Catalog,
        objects: &'a ExecutionContext,
        parameters: &'a BTreeMap<String, FieldValue>,
    ) -> Self {
        Self {
            catalog,
            objects,
            parameters,
        }
    }

    /// Translate a query.
    pub fn translate(&self, expr: &QueryExpr) -> Result<TranslatedQuery, Error> {
        let entity = self.catalog.require(&expr.candidate)?;
        if !expr.grouping.is_empty() {
            return Err(Error::UnsupportedOperator("GROUP BY".to_string()));
        }
        if expr.having.is_some() {
            return Err(Error::UnsupportedOperator("HAVING".to_string()));
        }
        let alias = expr.alias.as_deref();
        let result = self.result_shape(entity, alias, &expr.result)?;

        let mut translated = TranslatedQuery {
            entity: entity.name.clone(),
            query: DatastoreQuery::new(entity.kind.clone()),
            batch_keys: None,
            result,
        };
        if let Some(filter) = &expr.filter {
            self.add_filter(entity, alias, filter, &mut translated)?;
        }
        for order in &expr.ordering {
            let property = self.sort_property(entity, alias, &order.field)?;
            translated.query.sorts.push(match order.direction {
                OrderDirection::Asc => SortPredicate::asc(property),
                OrderDirection::Desc => SortPredicate::desc(property),
            });
        }
        if translated.result == ResultShape::Count {
            translated.query.keys_only = true;
        }
        check_capabilities(&translated.query)?;

        debug!(
            entity = %entity.name,
            filters = translated.query.filters.len(),
            sorts = translated.query.sorts.len(),
            ancestor = ?translated.query.ancestor,
            batch = translated.batch_keys.as_ref().map(Vec::len),
            "translated query"
        );
        Ok(translated)
    }

    // ----- filters -----

    fn add_filter(
        &self,
        entity: &'a EntityDef,
        alias: Option<&str>,
        filter: &Expr,
        out: &mut TranslatedQuery,
    ) -> Result<(), Error> {
        match filter {
            Expr::Binary {
                op: Operator::And,
                left,
                right,
            } => {
                self.add_filter(entity, alias, left, out)?;
                self.add_filter(entity, alias, right, out)
            }
            Expr::Binary { op, left, right } => {
                let native = match op {
                    Operator::Eq | Operator::Is => FilterOperator::Equal,
                    Operator::Lt => FilterOperator::LessThan,
                    Operator::Le => FilterOperator::LessThanOrEqual,
                    Operator::Gt => FilterOperator::GreaterThan,
                    Operator::Ge => FilterOperator::GreaterThanOrEqual,
                    other => return Err(Error::UnsupportedOperator(other.symbol().to_string())),
                };
                self.add_comparison(entity, alias, native, left, right, out)
            }
            Expr::Unary { op, .. } => Err(Error::UnsupportedOperator(op.symbol().to_string())),
            Expr::Field(_) | Expr::Literal(_) | Expr::Parameter(_) => Err(
                Error::UnsupportedFeature("a filter term must compare a field".to_string()),
            ),
        }
    }

    fn add_comparison(
        &self,
        entity: &'a EntityDef,
        alias: Option<&str>,
        op: FilterOperator,
        left: &Expr,
        right: &Expr,
        out: &mut TranslatedQuery,
    ) -> Result<(), Error> {
        let (path, operand, op) = match (left, right) {
            (Expr::Field(_), Expr::Field(_)) => {
                return Err(Error::UnsupportedFeature(
                    "comparing two fields".to_string(),
                ))
            }
            (Expr::Field(path), operand) => (path, operand, op),
            (operand, Expr::Field(path)) => (path, operand, op.flip()),
            _ => {
                return Err(Error::UnsupportedFeature(
                    "a filter term must compare a field".to_string(),
                ))
            }
        };
        let value = self.operand_value(operand)?;

        match self.resolve(entity, alias, path)? {
            Resolved::PrimaryKey(field) => self.add_key_filter(entity, field, op, &value, out),
            Resolved::Ancestor(field) => {
                // membership in a single ancestor is equality with it
                let value = match batch_elements(&value) {
                    None => value,
                    Some(elements) => match <[FieldValue; 1]>::try_from(elements) {
                        Ok([only]) => only,
                        Err(elements) if elements.is_empty() => {
                            return Err(Error::EmptyBatchFilter {
                                field: field.name.clone(),
                            })
                        }
                        Err(_) => {
                            return Err(Error::UnsupportedFeature(format!(
                                "membership in more than one ancestor on {}",
                                field.name
                            )))
                        }
                    },
                };
                if op != FilterOperator::Equal {
                    return Err(Error::UnsupportedFeature(format!(
                        "{op} filter on ancestor field {}",
                        field.name
                    )));
                }
                let key = match &value {
                    FieldValue::Null => {
                        return Err(Error::UnsupportedFeature(format!(
                            "null comparison on ancestor field {}",
                            field.name
                        )))
                    }
                    FieldValue::String(encoded) => {
                        Key::from_encoded(encoded).map_err(|_| Error::InvalidAncestor {
                            field: format!("{}.{}", entity.name, field.name),
                            value: encoded.clone(),
                        })?
                    }
                    other => self.related_key(field, other)?,
                };
                set_ancestor(out, key)
            }
            Resolved::Relation(field) => self.add_relation_filter(entity, field, op, &value, out),
            Resolved::Embedded(field) => Err(Error::UnsupportedFeature(format!(
                "filter on embedded field {} as a whole",
                field.name
            ))),
            Resolved::Property { field, column } => {
                if field.is_serialized() {
                    return Err(Error::UnsupportedFeature(format!(
                        "filter on serialized field {}",
                        field.name
                    )));
                }
                out.query
                    .filters
                    .push(FilterPredicate::new(column, op, convert::natural(&value)?));
                Ok(())
            }
        }
    }

    fn add_key_filter(
        &self,
        entity: &EntityDef,
        field: &FieldDef,
        op: FilterOperator,
        value: &FieldValue,
        out: &mut TranslatedQuery,
    ) -> Result<(), Error> {
        let Some(elements) = batch_elements(value) else {
            let key = self.candidate_key(entity, field, value)?;
            out.query.filters.push(FilterPredicate::new(KEY_PROPERTY, op, key));
            return Ok(());
        };

        if elements.is_empty() {
            return Err(Error::EmptyBatchFilter {
                field: field.name.clone(),
            });
        }
        if op != FilterOperator::Equal {
            return Err(Error::UnsupportedFeature(format!(
                "{op} filter with a collection of keys on {}",
                field.name
            )));
        }
        if out.batch_keys.is_some() {
            return Err(Error::UnsupportedFeature(format!(
                "more than one key collection filter on {}",
                field.name
            )));
        }
        let keys = elements
            .iter()
            .map(|element| self.candidate_key(entity, field, element))
            .collect::<Result<Vec<_>, _>>()?;
        out.batch_keys = Some(keys);
        Ok(())
    }

    fn add_relation_filter(
        &self,
        entity: &EntityDef,
        field: &FieldDef,
        op: FilterOperator,
        value: &FieldValue,
        out: &mut TranslatedQuery,
    ) -> Result<(), Error> {
        if value.is_null() {
            return Err(Error::UnsupportedFeature(format!(
                "null comparison on relation field {}",
                field.name
            )));
        }
        if op != FilterOperator::Equal {
            return Err(Error::UnsupportedFeature(format!(
                "{op} filter on relation field {}",
                field.name
            )));
        }

        match &field.relation {
            Relation::ManyToOne { target } => {
                let parent = self.related_key(field, value)?;
                let kind = &self.catalog.require(target)?.kind;
                if parent.kind() != kind {
                    return Err(Error::InvalidRelationValue(format!(
                        "{} refers to {target} but the value has kind {}",
                        field.name,
                        parent.kind()
                    )));
                }
                set_ancestor(out, parent)
            }
            Relation::OneToOne { target, .. } => {
                // the child lives below its owner, so the owner's key is the child's parent
                let child = self.related_key(field, value)?;
                let target_kind = &self.catalog.require(target)?.kind;
                if !child.is_complete() {
                    return Err(Error::InvalidRelationValue(format!(
                        "{} value {child} has no id",
                        field.name
                    )));
                }
                if child.kind() != target_kind {
                    return Err(Error::InvalidRelationValue(format!(
                        "{} refers to {target} but the value has kind {}",
                        field.name,
                        child.kind()
                    )));
                }
                let owner = child.parent().ok_or_else(|| {
                    Error::InvalidRelationValue(format!(
                        "{} value {child} has no parent",
                        field.name
                    ))
                })?;
                if owner.kind() != entity.kind {
                    return Err(Error::InvalidRelationValue(format!(
                        "{} value {child} has a parent of kind {}, expected {}",
                        field.name,
                        owner.kind(),
                        entity.kind
                    )));
                }
                out.query.filters.push(FilterPredicate::eq(KEY_PROPERTY, owner));
                Ok(())
            }
            Relation::OneToMany { .. } => Err(Error::UnsupportedFeature(format!(
                "filter on collection field {}",
                field.name
            ))),
            Relation::None => Err(Error::Internal(format!(
                "{} is not a relation field",
                field.name
            ))),
        }
    }

    fn operand_value(&self, operand: &Expr) -> Result<FieldValue, Error> {
        match operand {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Parameter(name) => self
                .parameters
                .get(name)
                .cloned()
                .ok_or_else(|| Error::InvalidArgument(format!("parameter {name} is not bound"))),
            Expr::Unary { op, .. } | Expr::Binary { op, .. } => {
                Err(Error::UnsupportedOperator(op.symbol().to_string()))
            }
            Expr::Field(_) => Err(Error::UnsupportedFeature("comparing two fields".to_string())),
        }
    }

    /// Key of a candidate record named by a key, an encoded key, an id, a
    /// name or a stored object.
    fn candidate_key(&self, entity: &EntityDef, field: &FieldDef, value: &FieldValue) -> Result<Key, Error> {
        Ok(match value {
            FieldValue::Key(key) => key.clone(),
            FieldValue::String(s) => {
                Key::from_encoded(s).unwrap_or_else(|_| Key::from_name(entity.kind.clone(), s.clone()))
            }
            FieldValue::Long(id) => Key::from_id(entity.kind.clone(), *id),
            FieldValue::Int(id) => Key::from_id(entity.kind.clone(), i64::from(*id)),
            FieldValue::Reference(id) => self.stored_key(field, *id)?,
            FieldValue::Null => {
                return Err(Error::InvalidArgument(format!(
                    "{} cannot be compared with null",
                    field.name
                )))
            }
            other => {
                return Err(Error::TypeConversion {
                    expected: "key".to_string(),
                    found: other.type_name().to_string(),
                })
            }
        })
    }

    /// Key of a related record named by a key, an encoded key or a stored object.
    fn related_key(&self, field: &FieldDef, value: &FieldValue) -> Result<Key, Error> {
        match value {
            FieldValue::Key(key) => Ok(key.clone()),
            FieldValue::String(encoded) => Key::from_encoded(encoded).map_err(|_| {
                Error::InvalidRelationValue(format!("{encoded} is not an encoded key"))
            }),
            FieldValue::Reference(id) => self.stored_key(field, *id),
            other => Err(Error::InvalidRelationValue(format!(
                "{} cannot be compared with a {}",
                field.name,
                other.type_name()
            ))),
        }
    }

    fn stored_key(&self, field: &FieldDef, id: ObjectId) -> Result<Key, Error> {
        self.objects.key_of(id).cloned().ok_or_else(|| {
            Error::InvalidRelationValue(format!(
                "{} value {id} has not been written",
                field.name
            ))
        })
    }

    // ----- sorts and results -----

    fn sort_property(&self, entity: &'a EntityDef, alias: Option<&str>, path: &str) -> Result<String, Error> {
        match self.resolve(entity, alias, path)? {
            Resolved::PrimaryKey(_) => Ok(KEY_PROPERTY.to_string()),
            Resolved::Property { field, .. } if field.is_serialized() => Err(
                Error::UnsupportedFeature(format!("sort on serialized field {}", field.name)),
            ),
            Resolved::Property { column, .. } => Ok(column),
            Resolved::Ancestor(field) | Resolved::Relation(field) | Resolved::Embedded(field) => {
                Err(Error::UnsupportedFeature(format!("sort on field {}", field.name)))
            }
        }
    }

    fn result_shape(
        &self,
        entity: &'a EntityDef,
        alias: Option<&str>,
        result: &[ResultExpr],
    ) -> Result<ResultShape, Error> {
        if result.is_empty() {
            return Ok(ResultShape::Objects);
        }
        let mut count = false;
        for item in result {
            if let ResultExpr::Aggregate { function, .. } = item {
                match function {
                    AggregateFunction::Count => count = true,
                    other => return Err(Error::UnsupportedOperator(other.name().to_string())),
                }
            }
        }
        if count {
            if result.len() > 1 {
                return Err(Error::UnsupportedFeature(
                    "count cannot be combined with other results".to_string(),
                ));
            }
            // the counted field is not checked
            return Ok(ResultShape::Count);
        }

        let mut fields = Vec::with_capacity(result.len());
        for item in result {
            if let ResultExpr::Field(path) = item {
                fields.push(self.projected_field(entity, alias, path)?);
            }
        }
        Ok(ResultShape::Fields(fields))
    }

    fn projected_field(&self, entity: &'a EntityDef, alias: Option<&str>, path: &str) -> Result<usize, Error> {
        let segments = strip_alias(alias, path);
        let field = match self.resolve(entity, alias, path)? {
            Resolved::Embedded(field) => Some(field),
            _ if segments.len() > 1 => None,
            Resolved::PrimaryKey(field)
            | Resolved::Ancestor(field)
            | Resolved::Relation(field)
            | Resolved::Property { field, .. } => {
                return entity.field_number(&field.name).ok_or_else(|| Error::UnknownField {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                })
            }
        };
        Err(Error::UnsupportedFeature(format!(
            "projection of embedded field {}",
            field.map_or(path, |f| f.name.as_str())
        )))
    }

    // ----- paths -----

    /// Resolve a dotted path. A leading alias is dropped; further segments
    /// walk through embedded fields, applying their column overrides.
    fn resolve(&self, entity: &'a EntityDef, alias: Option<&str>, path: &str) -> Result<Resolved<'a>, Error> {
        let segments = strip_alias(alias, path);
        let Some((first, rest)) = segments.split_first() else {
            return Err(Error::InvalidArgument("empty field path".to_string()));
        };
        let unknown = |owner: &EntityDef, name: &str| Error::UnknownField {
            entity: owner.name.clone(),
            field: name.to_string(),
        };
        let field = entity.get_field(first).ok_or_else(|| unknown(entity, first))?;
        if rest.is_empty() {
            return Ok(match field.role {
                FieldRole::PrimaryKey => Resolved::PrimaryKey(field),
                FieldRole::Ancestor => Resolved::Ancestor(field),
                _ if field.is_relation() => Resolved::Relation(field),
                _ if field.is_embedded() => Resolved::Embedded(field),
                _ => Resolved::Property {
                    field,
                    column: field.column_name().to_string(),
                },
            });
        }

        let mut current = field;
        let mut column = String::new();
        for segment in rest {
            let embedded = match current.field_type.embedded_entity() {
                Some(name) => self.catalog.require(name)?,
                None => {
                    return Err(Error::UnsupportedFeature(format!(
                        "{} is not an embedded field",
                        current.name
                    )))
                }
            };
            let sub = embedded
                .get_field(segment)
                .ok_or_else(|| unknown(embedded, segment))?;
            column = current
                .embedded_columns
                .get(&sub.name)
                .cloned()
                .unwrap_or_else(|| sub.column_name().to_string());
            current = sub;
        }
        Ok(if current.is_embedded() {
            Resolved::Embedded(current)
        } else {
            Resolved::Property {
                field: current,
                column,
            }
        })
    }
}

fn strip_alias<'p>(alias: Option<&str>, path: &'p str) -> Vec<&'p str> {
    let mut segments: Vec<&str> = path.split('.').collect();
    if segments.len() > 1 && alias == Some(segments[0]) {
        segments.remove(0);
    }
    segments
}

/// Elements of a collection parameter, or `None` for a single value.
fn batch_elements(value: &FieldValue) -> Option<Vec<FieldValue>> {
    match value {
        FieldValue::Collection(ids) => Some(ids.iter().copied().map(FieldValue::Reference).collect()),
        other => other.elements().map(<[FieldValue]>::to_vec),
    }
}

fn set_ancestor(out: &mut TranslatedQuery, key: Key) -> Result<(), Error> {
    match &out.query.ancestor {
        Some(existing) if *existing != key => Err(Error::UnsupportedFeature(format!(
            "conflicting ancestors {existing} and {key}"
        ))),
        _ => {
            out.query.ancestor = Some(key);
            Ok(())
        }
    }
}

/// Reject native queries the datastore would refuse.
fn check_capabilities(query: &DatastoreQuery) -> Result<(), Error> {
    let inequalities = query.inequality_properties();
    if inequalities.len() > 1 {
        return Err(Error::UnsupportedFeature(format!(
            "inequality filters on more than one property: {}",
            inequalities.join(", ")
        )));
    }
    if let (Some(property), Some(sort)) = (inequalities.first(), query.sorts.first()) {
        if sort.property != *property {
            return Err(Error::UnsupportedFeature(format!(
                "the first sort must be on inequality property {property}, found {}",
                sort.property
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, ScalarType};
    use crate::query::expr::OrderSpec;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn catalog() -> Arc<Catalog> {
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
                EntityDef::new("Book")
                    .with_field(FieldDef::primary_key("id", ScalarType::String))
                    .with_field(FieldDef::optional("title", ScalarType::String))
                    .with_field(FieldDef::optional("author", ScalarType::String))
                    .with_field(FieldDef::optional("isbn", ScalarType::String))
                    .with_field(FieldDef::new("pages", FieldType::Scalar(ScalarType::Int32)))
                    .with_field(FieldDef::embedded("name", "Name"))
                    .with_field(
                        FieldDef::embedded("anotherName", "Name")
                            .with_embedded_column("last", "anotherLast"),
                    )
                    .with_field(FieldDef::one_to_one("cover", "Cover"))
                    .with_field(FieldDef::one_to_many("chapters", "Chapter")),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Cover")
                    .with_field(FieldDef::primary_key("id", ScalarType::Key))
                    .with_field(FieldDef::ancestor("bookKey", ScalarType::String)),
            )
            .unwrap();
        catalog
            .register(
                EntityDef::new("Chapter")
                    .with_field(FieldDef::primary_key("id", ScalarType::Key))
                    .with_field(FieldDef::parent("book", "Book")),
            )
            .unwrap();
        Arc::new(catalog)
    }

    fn translate(
        expr: &QueryExpr,
        params: &[(&str, FieldValue)],
    ) -> Result<TranslatedQuery, Error> {
        let catalog = catalog();
        let objects = ExecutionContext::new(Arc::clone(&catalog));
        let parameters: BTreeMap<String, FieldValue> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        QueryTranslator::new(&catalog, &objects, &parameters).translate(expr)
    }

    fn unsupported_operator(filter: Expr) -> Option<String> {
        translate(&QueryExpr::new("Book").with_filter(filter), &[])
            .err()
            .and_then(|e| e.unsupported_operator().map(str::to_string))
    }

    #[test]
    fn test_conjunction_with_sort() {
        let expr = QueryExpr::new("Book")
            .with_alias("b")
            .with_filter(
                Expr::field("b.author")
                    .eq(Expr::literal("Joe Blow"))
                    .and(Expr::literal("A").lt(Expr::field("title"))),
            )
            .with_order(OrderSpec::asc("b.title"))
            .with_order(OrderSpec::desc("id"));

        let translated = translate(&expr, &[]).unwrap();
        assert_eq!(
            translated.query.filters,
            vec![
                FilterPredicate::eq("author", "Joe Blow"),
                FilterPredicate::gt("title", "A"),
            ]
        );
        assert_eq!(
            translated.query.sorts,
            vec![SortPredicate::asc("title"), SortPredicate::desc(KEY_PROPERTY)]
        );
        assert_eq!(translated.result, ResultShape::Objects);
    }

    #[test]
    fn test_unsupported_operators_are_named() {
        let title = || Expr::field("title");
        let foo = || Expr::literal("foo");
        assert_eq!(unsupported_operator(title().eq(foo()).or(title().eq(foo()))).as_deref(), Some("OR"));
        assert_eq!(
            unsupported_operator(Expr::unary(Operator::Not, title().eq(foo()))).as_deref(),
            Some("NOT")
        );
        assert_eq!(
            unsupported_operator(Expr::binary(Operator::Like, title(), foo())).as_deref(),
            Some("LIKE")
        );
        assert_eq!(
            unsupported_operator(
                Expr::field("pages").eq(Expr::binary(Operator::Add, Expr::literal(1i64), Expr::literal(2i64)))
            )
            .as_deref(),
            Some("+")
        );
        assert_eq!(
            unsupported_operator(Expr::binary(Operator::IsNot, title(), Expr::null())).as_deref(),
            Some("IS NOT")
        );
    }

    #[test]
    fn test_grouping_and_aggregates_rejected() {
        let grouped = QueryExpr::new("Book").group_by("author");
        assert_eq!(
            translate(&grouped, &[]).unwrap_err().unsupported_operator(),
            Some("GROUP BY")
        );

        let avg = QueryExpr::new("Book").aggregate(AggregateFunction::Avg, "pages");
        assert_eq!(translate(&avg, &[]).unwrap_err().unsupported_operator(), Some("avg"));

        let mixed = QueryExpr::new("Book")
            .aggregate(AggregateFunction::Count, "id")
            .select("title");
        assert!(matches!(
            translate(&mixed, &[]),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_inequality_restrictions() {
        let two = QueryExpr::new("Book").with_filter(
            Expr::field("title")
                .gt(Expr::literal("A"))
                .and(Expr::field("isbn").lt(Expr::literal("5"))),
        );
        assert!(matches!(translate(&two, &[]), Err(Error::UnsupportedFeature(_))));

        let wrong_sort = QueryExpr::new("Book")
            .with_filter(Expr::field("title").gt(Expr::literal("A")))
            .with_order(OrderSpec::asc("author"));
        assert!(matches!(
            translate(&wrong_sort, &[]),
            Err(Error::UnsupportedFeature(_))
        ));

        let range = QueryExpr::new("Book")
            .with_filter(
                Expr::field("title")
                    .ge(Expr::literal("A"))
                    .and(Expr::field("title").le(Expr::literal("C"))),
            )
            .with_order(OrderSpec::asc("title"))
            .with_order(OrderSpec::asc("author"));
        assert!(translate(&range, &[]).is_ok());
    }

    #[test]
    fn test_key_filters() {
        let key = Key::from_id("Book", 7);
        let expr = QueryExpr::new("Book").with_filter(Expr::field("id").eq(Expr::param("key")));

        for value in [
            FieldValue::Key(key.clone()),
            FieldValue::String(key.to_encoded().unwrap()),
            FieldValue::Long(7),
        ] {
            let translated = translate(&expr, &[("key", value)]).unwrap();
            assert_eq!(
                translated.query.filters,
                vec![FilterPredicate::eq(KEY_PROPERTY, key.clone())]
            );
        }

        let named = translate(&expr, &[("key", FieldValue::String("foo".into()))]).unwrap();
        assert_eq!(
            named.query.filters[0].value,
            kindred_proto::Value::Key(Key::from_name("Book", "foo"))
        );

        let greater = QueryExpr::new("Book").with_filter(Expr::field("id").gt(Expr::param("key")));
        let translated = translate(&greater, &[("key", FieldValue::Key(key.clone()))]).unwrap();
        assert_eq!(translated.query.filters, vec![FilterPredicate::gt(KEY_PROPERTY, key)]);
    }

    #[test]
    fn test_key_collection_becomes_batch() {
        let expr = QueryExpr::new("Book").with_filter(Expr::field("id").eq(Expr::param("ids")));
        let keys = vec![Key::from_id("Book", 2), Key::from_id("Book", 1)];
        let list = FieldValue::List(keys.iter().cloned().map(FieldValue::Key).collect());

        let translated = translate(&expr, &[("ids", list)]).unwrap();
        assert_eq!(translated.batch_keys, Some(keys));
        assert!(translated.query.filters.is_empty());
    }

    #[test]
    fn test_empty_key_collection_rejected() {
        let empty = || ("ids", FieldValue::List(Vec::new()));
        let plain = QueryExpr::new("Book").with_filter(Expr::field("id").eq(Expr::param("ids")));
        let combined = QueryExpr::new("Book").with_filter(
            Expr::field("title")
                .eq(Expr::literal("Foo"))
                .and(Expr::field("id").eq(Expr::param("ids"))),
        );
        let greater = QueryExpr::new("Book").with_filter(Expr::field("id").gt(Expr::param("ids")));
        let ordered = plain.clone().with_order(OrderSpec::asc("id"));

        for expr in [plain, combined, greater, ordered] {
            assert!(matches!(
                translate(&expr, &[empty()]),
                Err(Error::EmptyBatchFilter { .. })
            ));
        }
    }

    #[test]
    fn test_embedded_paths_use_overrides() {
        let expr = QueryExpr::new("Book")
            .with_alias("b")
            .with_filter(
                Expr::field("b.name.first")
                    .eq(Expr::literal("Max"))
                    .and(Expr::field("anotherName.last").eq(Expr::literal("Ross"))),
            )
            .with_order(OrderSpec::asc("b.anotherName.last"));

        let translated = translate(&expr, &[]).unwrap();
        assert_eq!(
            translated.query.filters,
            vec![
                FilterPredicate::eq("first", "Max"),
                FilterPredicate::eq("anotherLast", "Ross"),
            ]
        );
        assert_eq!(translated.query.sorts, vec![SortPredicate::asc("anotherLast")]);
    }

    #[test]
    fn test_bad_paths() {
        let unknown_sub = QueryExpr::new("Book").with_filter(Expr::field("name.middle").eq(Expr::literal("x")));
        assert!(matches!(
            translate(&unknown_sub, &[]),
            Err(Error::UnknownField { entity, .. }) if entity == "Name"
        ));

        let not_embedded = QueryExpr::new("Book").with_filter(Expr::field("cover.id").eq(Expr::literal("x")));
        assert!(matches!(
            translate(&not_embedded, &[]),
            Err(Error::UnsupportedFeature(_))
        ));

        let unknown_sort = QueryExpr::new("Book").with_order(OrderSpec::asc("publisher"));
        assert!(matches!(
            translate(&unknown_sort, &[]),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_ancestor_field_sets_ancestor() {
        let book = Key::from_id("Book", 3);
        let eq = QueryExpr::new("Cover").with_filter(Expr::field("bookKey").eq(Expr::param("p")));
        let translated = translate(&eq, &[("p", FieldValue::String(book.to_encoded().unwrap()))]).unwrap();
        assert_eq!(translated.query.ancestor, Some(book.clone()));
        assert!(translated.query.filters.is_empty());

        let gt = QueryExpr::new("Cover").with_filter(Expr::field("bookKey").gt(Expr::param("p")));
        assert!(matches!(
            translate(&gt, &[("p", FieldValue::Key(book))]),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_ancestor_field_membership() {
        let book = Key::from_id("Book", 3);
        let expr = QueryExpr::new("Cover").with_filter(Expr::field("bookKey").eq(Expr::param("p")));

        let single = FieldValue::List(vec![FieldValue::Key(book.clone())]);
        let translated = translate(&expr, &[("p", single)]).unwrap();
        assert_eq!(translated.query.ancestor, Some(book.clone()));
        assert!(translated.batch_keys.is_none());

        let several = FieldValue::List(vec![
            FieldValue::Key(book),
            FieldValue::Key(Key::from_id("Book", 4)),
        ]);
        assert!(matches!(
            translate(&expr, &[("p", several)]),
            Err(Error::UnsupportedFeature(_))
        ));
        assert!(matches!(
            translate(&expr, &[("p", FieldValue::List(Vec::new()))]),
            Err(Error::EmptyBatchFilter { ref field }) if field == "bookKey"
        ));
    }

    #[test]
    fn test_many_to_one_sets_ancestor() {
        let book = Key::from_id("Book", 3);
        let expr = QueryExpr::new("Chapter").with_filter(Expr::field("book").eq(Expr::param("b")));
        let translated = translate(&expr, &[("b", FieldValue::Key(book.clone()))]).unwrap();
        assert_eq!(translated.query.ancestor, Some(book));
    }

    #[test]
    fn test_one_to_one_owner_filter() {
        let book = Key::from_id("Book", 3);
        let cover = Key::from_id("Cover", 9).with_parent(&book).unwrap();
        let expr = QueryExpr::new("Book").with_filter(Expr::field("cover").eq(Expr::param("c")));

        let translated = translate(&expr, &[("c", FieldValue::Key(cover.clone()))]).unwrap();
        assert_eq!(
            translated.query.filters,
            vec![FilterPredicate::eq(KEY_PROPERTY, book.clone())]
        );

        for bad in [
            Key::from_id("Cover", 9),
            Key::from_id("Chapter", 9).with_parent(&book).unwrap(),
            Key::from_id("Cover", 9).with_parent(&Key::from_id("Chapter", 1)).unwrap(),
        ] {
            assert!(matches!(
                translate(&expr, &[("c", FieldValue::Key(bad))]),
                Err(Error::InvalidRelationValue(_))
            ));
        }

        let gt = QueryExpr::new("Book").with_filter(Expr::field("cover").gt(Expr::param("c")));
        assert!(matches!(
            translate(&gt, &[("c", FieldValue::Key(cover))]),
            Err(Error::UnsupportedFeature(_))
        ));
        let null = QueryExpr::new("Book").with_filter(Expr::field("cover").eq(Expr::null()));
        assert!(matches!(translate(&null, &[]), Err(Error::UnsupportedFeature(_))));
    }

    #[test]
    fn test_null_comparison_on_plain_field() {
        let expr = QueryExpr::new("Book")
            .with_filter(Expr::binary(Operator::Is, Expr::field("title"), Expr::null()));
        let translated = translate(&expr, &[]).unwrap();
        assert_eq!(
            translated.query.filters,
            vec![FilterPredicate::eq("title", kindred_proto::Value::Null)]
        );
    }

    #[test]
    fn test_result_shapes() {
        let count = QueryExpr::new("Book").aggregate(AggregateFunction::Count, "unknown");
        let translated = translate(&count, &[]).unwrap();
        assert_eq!(translated.result, ResultShape::Count);
        assert!(translated.query.keys_only);

        let fields = QueryExpr::new("Book").with_alias("b").select("b.title").select("id");
        assert_eq!(
            translate(&fields, &[]).unwrap().result,
            ResultShape::Fields(vec![1, 0])
        );

        let embedded = QueryExpr::new("Book").select("name.first");
        assert!(matches!(translate(&embedded, &[]), Err(Error::UnsupportedFeature(_))));

        let unknown = QueryExpr::new("Book").select("publisher");
        assert!(matches!(translate(&unknown, &[]), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_unbound_parameter() {
        let expr = QueryExpr::new("Book").with_filter(Expr::field("title").eq(Expr::param("t")));
        assert!(matches!(translate(&expr, &[]), Err(Error::InvalidArgument(_))));
    }
}
