//! Conversion of managed objects to and from datastore records.

mod consumer;
mod field_manager;
mod registry;

pub use consumer::MappingConsumer;
pub use field_manager::{FieldManager, RelationWrite};
pub use registry::KeyRegistry;
