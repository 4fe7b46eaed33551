//! Kindred record-model types.
//!
//! This crate defines the vocabulary shared between the mapping layer and a
//! datastore driver: hierarchical keys, typed property values, records and
//! the native query descriptor.
//!
//! # Modules
//!
//! - [`key`] - Path-structured record keys and their string encoding
//! - [`value`] - Property value types
//! - [`record`] - Records (key plus properties)
//! - [`query`] - Native filter, sort and ancestor query descriptors
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! All types in this crate derive `rkyv::Archive`, `rkyv::Serialize`, and
//! `rkyv::Deserialize`, as well as serde's traits:
//!
//! ```ignore
//! use kindred_proto::{Key, Record};
//!
//! let record = Record::new(Key::from_id("Book", 1)).with_property("title", "Foo Book");
//! let bytes = record.to_bytes()?;
//! let back = Record::from_bytes(&bytes)?;
//! ```

pub mod error;
pub mod key;
pub mod query;
pub mod record;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use key::{Key, KeyId, PathElement};
pub use query::{
    DatastoreQuery, FetchOptions, FilterOperator, FilterPredicate, SortDirection, SortPredicate,
    KEY_PROPERTY,
};
pub use record::Record;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_roundtrip() {
        let query = DatastoreQuery::new("Book")
            .with_ancestor(Key::from_id("Shelf", 3))
            .with_filter(FilterPredicate::eq("author", "Joe Blow"))
            .with_sort(SortPredicate::asc("title"));

        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&query).unwrap();
        let archived =
            rkyv::access::<query::ArchivedDatastoreQuery, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: DatastoreQuery =
            rkyv::deserialize::<DatastoreQuery, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(query, deserialized);
    }
}
