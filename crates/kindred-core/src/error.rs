//! Core error types.
//!
//! Errors fall into four groups that callers treat differently:
//!
//! - user/mapping errors: the object graph or the query arguments are invalid;
//! - unsupported-query errors: the query cannot be expressed against the
//!   datastore and was rejected before any datastore call;
//! - data-integrity errors: stored data is inconsistent;
//! - datastore failures: the backend reported an error, wrapped as-is.
//!
//! None of them are retried by this crate.

use thiserror::Error;

/// Core mapping and query errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] kindred_proto::Error),

    /// The datastore reported a failure.
    #[error("datastore failure: {0}")]
    Datastore(#[from] DatastoreError),

    /// Invalid catalog metadata.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A value does not have the type its field declares.
    #[error("type conversion error: expected {expected}, found {found}")]
    TypeConversion { expected: String, found: String },

    /// Invariant violation inside the mapping layer.
    #[error("internal error: {0}")]
    Internal(String),

    /// A complete primary key was overwritten with a different value.
    #[error(
        "Attempt was made to modify the primary key of an object of type {class} identified by \
         key {key}. Primary keys are immutable."
    )]
    ImmutablePrimaryKey { class: String, key: String },

    /// An established parent key was overwritten with a different value.
    #[error(
        "Attempt was made to modify the ancestor of an object of type {class} identified by \
         key {key}. Ancestors are immutable."
    )]
    ImmutableAncestor { class: String, key: String },

    /// The value of an ancestor field cannot be turned into a key.
    #[error("Cannot convert value {value} of field {field} into a key")]
    InvalidAncestor { field: String, value: String },

    /// A stored null cannot be assigned to a non-nullable field.
    #[error(
        "Datastore entity with kind {kind} and key {key} has a null property named {property}. \
         This property is mapped to {field}, which cannot accept null values."
    )]
    NullAssignment {
        kind: String,
        key: String,
        property: String,
        field: String,
    },

    /// A query or object refers to a field the entity does not declare.
    #[error("{entity} does not have a field named {field}")]
    UnknownField { entity: String, field: String },

    /// A relation filter value cannot be resolved to a suitable key.
    #[error("invalid relation filter value: {0}")]
    InvalidRelationValue(String),

    /// A key batch parameter is empty.
    #[error("a batch lookup on {field} requires at least one key")]
    EmptyBatchFilter { field: String },

    /// An argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The object graph cannot be mapped.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// The query uses an operator the datastore cannot evaluate.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The query uses a feature the datastore cannot evaluate.
    #[error("unsupported query feature: {0}")]
    UnsupportedFeature(String),

    /// A stored child key list refers to a record that does not exist.
    #[error(
        "Field {field} in parent with key={parent} refers to child with key={child} but this \
         doesn't exist! Check your data integrity"
    )]
    DataIntegrity {
        field: String,
        parent: String,
        child: String,
    },
}

impl Error {
    /// Check whether the error was caused by invalid caller input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::ImmutablePrimaryKey { .. }
                | Error::ImmutableAncestor { .. }
                | Error::InvalidAncestor { .. }
                | Error::NullAssignment { .. }
                | Error::UnknownField { .. }
                | Error::InvalidRelationValue(_)
                | Error::EmptyBatchFilter { .. }
                | Error::InvalidArgument(_)
                | Error::Mapping(_)
        )
    }

    /// Check whether the error rejects a query the datastore cannot evaluate.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedOperator(_) | Error::UnsupportedFeature(_)
        )
    }

    /// Name of the rejected operator, for unsupported-operator errors.
    pub fn unsupported_operator(&self) -> Option<&str> {
        match self {
            Error::UnsupportedOperator(op) => Some(op),
            _ => None,
        }
    }
}

/// Failures reported by a [`Datastore`](crate::storage::Datastore).
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Stored bytes could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] kindred_proto::Error),

    /// The datastore rejected the request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The datastore could not serve the request.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}
