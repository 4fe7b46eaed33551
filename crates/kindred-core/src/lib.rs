//! Kindred Core - object/record mapping and query translation.
//!
//! This crate maps an object graph onto a hierarchical key-value datastore
//! whose records are grouped by ancestor keys, and translates object queries
//! into the restricted query form such a datastore evaluates.
//!
//! # Modules
//!
//! - [`catalog`] - Entity and field metadata
//! - [`object`] - Managed domain objects and their field values
//! - [`mapping`] - The field mapping engine and parent key resolution
//! - [`relation`] - Owned relations and object loading
//! - [`persist`] - Insert, update, fetch and delete in a unit of work
//! - [`query`] - Query translation, capability checks and execution
//! - [`storage`] - The datastore seam and a sled-backed reference datastore
//!
//! # Example
//!
//! ```ignore
//! use kindred_core::{Catalog, EntityDef, FieldDef, Mapper, MapperConfig, ScalarType};
//! use kindred_core::storage::{StorageConfig, StorageEngine};
//!
//! let mut catalog = Catalog::new();
//! catalog.register(
//!     EntityDef::new("Book")
//!         .with_field(FieldDef::primary_key("id", ScalarType::Key))
//!         .with_field(FieldDef::optional("title", ScalarType::String)),
//! )?;
//! let mapper = Mapper::new(catalog, MapperConfig::default())?;
//! let store = StorageEngine::open(StorageConfig::temporary())?;
//!
//! let mut session = mapper.session(&store);
//! let book = session.create("Book")?;
//! session.objects_mut().set(book, "title", "Foo Book")?;
//! session.insert_object(book)?;
//! ```

pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod mapper;
pub mod mapping;
pub mod object;
pub mod persist;
pub mod query;
pub mod relation;
pub mod serialization;
pub mod storage;

pub use catalog::{Catalog, EntityDef, FieldDef, FieldRole, FieldType, Relation, ScalarType};
pub use config::{MapperConfig, StorageVersion};
pub use error::{DatastoreError, Error};
pub use mapper::Mapper;
pub use mapping::{FieldManager, KeyRegistry};
pub use object::{ExecutionContext, FieldValue, Lifecycle, ObjectId};
pub use persist::{InsertOutcome, Session};
pub use query::{Expr, Operator, OrderSpec, Query, QueryExpr, QueryResult};
pub use serialization::{SerializationStrategy, SerializerRegistry};
pub use storage::{Datastore, StorageConfig, StorageEngine};

/// Re-export protocol types.
pub use kindred_proto as proto;
