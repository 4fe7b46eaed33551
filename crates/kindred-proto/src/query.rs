//! Native query descriptors.
//!
//! These types describe exactly what the datastore can evaluate: a kind, an
//! optional ancestor, a conjunction of simple property comparisons, sort
//! orders and a keys-only flag. Anything richer has to be rejected or
//! rewritten before a query reaches this form.

use crate::key::Key;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::cmp::Ordering;
use std::fmt;

/// Reserved property name that addresses a record's key in filters and sorts.
pub const KEY_PROPERTY: &str = "__key__";

/// Comparison operators the datastore evaluates natively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum FilterOperator {
    /// `=`
    Equal,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
}

impl FilterOperator {
    /// Check whether this is an inequality (range) operator.
    pub fn is_inequality(&self) -> bool {
        !matches!(self, FilterOperator::Equal)
    }

    /// The operator to use when the operands are swapped, e.g. `2 < x` becomes `x > 2`.
    pub fn flip(&self) -> Self {
        match self {
            FilterOperator::Equal => FilterOperator::Equal,
            FilterOperator::GreaterThan => FilterOperator::LessThan,
            FilterOperator::GreaterThanOrEqual => FilterOperator::LessThanOrEqual,
            FilterOperator::LessThan => FilterOperator::GreaterThan,
            FilterOperator::LessThanOrEqual => FilterOperator::GreaterThanOrEqual,
        }
    }

    /// Check whether `property <op> value` holds given `property.cmp(value)`.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterOperator::Equal => ordering == Ordering::Equal,
            FilterOperator::GreaterThan => ordering == Ordering::Greater,
            FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            FilterOperator::LessThan => ordering == Ordering::Less,
            FilterOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }

    /// Operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single `property <op> value` comparison.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FilterPredicate {
    /// Stored property name, or [`KEY_PROPERTY`].
    pub property: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Value to compare against.
    pub value: Value,
}

impl FilterPredicate {
    /// Create a new filter predicate.
    pub fn new(property: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    /// Create an equality filter.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, FilterOperator::Equal, value)
    }

    /// Create a greater-than filter.
    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, FilterOperator::GreaterThan, value)
    }

    /// Create a greater-than-or-equal filter.
    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, FilterOperator::GreaterThanOrEqual, value)
    }

    /// Create a less-than filter.
    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, FilterOperator::LessThan, value)
    }

    /// Create a less-than-or-equal filter.
    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, FilterOperator::LessThanOrEqual, value)
    }
}

/// Sort direction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Sort on one property.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct SortPredicate {
    /// Stored property name, or [`KEY_PROPERTY`].
    pub property: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortPredicate {
    /// Create an ascending sort.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Create a descending sort.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A query the datastore can execute directly.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct DatastoreQuery {
    /// Kind to query.
    pub kind: String,
    /// Restrict results to this key and its descendants.
    pub ancestor: Option<Key>,
    /// Conjunction of filters.
    pub filters: Vec<FilterPredicate>,
    /// Sort orders, most significant first.
    pub sorts: Vec<SortPredicate>,
    /// Return keys without properties.
    pub keys_only: bool,
}

impl DatastoreQuery {
    /// Create a query over a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: None,
            filters: Vec::new(),
            sorts: Vec::new(),
            keys_only: false,
        }
    }

    /// Restrict to an ancestor.
    pub fn with_ancestor(mut self, ancestor: Key) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    /// Add a filter.
    pub fn with_filter(mut self, filter: FilterPredicate) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sort.
    pub fn with_sort(mut self, sort: SortPredicate) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Return keys only.
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Distinct properties that carry an inequality filter, in filter order.
    pub fn inequality_properties(&self) -> Vec<&str> {
        let mut properties: Vec<&str> = Vec::new();
        for filter in self.filters.iter().filter(|f| f.operator.is_inequality()) {
            if !properties.contains(&filter.property.as_str()) {
                properties.push(&filter.property);
            }
        }
        properties
    }
}

/// Result window for a query.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct FetchOptions {
    /// Maximum number of results. `None` means unlimited.
    pub limit: Option<usize>,
    /// Number of leading results to skip.
    pub offset: usize,
}

impl FetchOptions {
    /// Create options with only a limit.
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
