//! Owned relations: child lookup and object loading.

mod fk_store;
mod loader;

pub use fk_store::ForeignKeyStore;
pub use loader::Loader;

use crate::catalog::FieldDef;
use crate::error::Error;
use crate::object::FieldValue;
use kindred_proto::Record;

/// Resolves relation-valued fields while an object is being loaded.
///
/// A field manager reads plain fields from the record itself but hands
/// relation fields to its resolver, which may query the datastore and
/// materialize further objects.
pub trait RelationResolver {
    /// Produce the value of relation `field` for the object stored in `record`.
    fn fetch_relation(&mut self, record: &Record, field: &FieldDef) -> Result<FieldValue, Error>;
}
