//! Shared fixtures for integration tests.

#![allow(dead_code)]

use kindred_core::catalog::{Catalog, EntityDef, FieldDef, FieldType, ScalarType};
use kindred_core::storage::{Datastore, RecordStream, StorageConfig, StorageEngine};
use kindred_core::{DatastoreError, Mapper, MapperConfig, ObjectId, Session};
use kindred_proto::{DatastoreQuery, FetchOptions, Key, Record};
use std::cell::Cell;

pub struct TestContext {
    pub store: StorageEngine,
    pub mapper: Mapper,
    _dir: tempfile::TempDir, // Keep the temp dir alive
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(MapperConfig::default())
    }

    pub fn with_config(config: MapperConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = StorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        let mapper = Mapper::new(library_catalog(), config).unwrap();
        Self {
            store,
            mapper,
            _dir: dir,
        }
    }

    pub fn session(&self) -> Session<'_> {
        self.mapper.session(&self.store)
    }
}

/// Books with covers, ordered chapters and reviews, plus people with
/// embedded names.
pub fn library_catalog() -> Catalog {
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
                .with_field(FieldDef::optional("pages", ScalarType::Int32))
                .with_field(FieldDef::new("tags", FieldType::List(ScalarType::String)))
                .with_field(FieldDef::one_to_one("cover", "Cover"))
                .with_field(FieldDef::one_to_many("chapters", "Chapter").mapped_by("book").ordered()),
        )
        .unwrap();
    catalog
        .register(
            EntityDef::new("Cover")
                .with_field(FieldDef::primary_key("id", ScalarType::Key))
                .with_field(FieldDef::ancestor("bookKey", ScalarType::String))
                .with_field(FieldDef::optional("color", ScalarType::String)),
        )
        .unwrap();
    catalog
        .register(
            EntityDef::new("Chapter")
                .with_field(FieldDef::primary_key("id", ScalarType::Key))
                .with_field(FieldDef::parent("book", "Book"))
                .with_field(FieldDef::optional("title", ScalarType::String)),
        )
        .unwrap();
    catalog
        .register(
            EntityDef::new("Review")
                .with_field(FieldDef::primary_key("id", ScalarType::Key))
                .with_field(FieldDef::parent("book", "Book"))
                .with_field(FieldDef::optional("text", ScalarType::String)),
        )
        .unwrap();
    catalog
        .register(
            EntityDef::new("Person")
                .with_field(FieldDef::primary_key("id", ScalarType::Key))
                .with_field(FieldDef::embedded("name", "Name"))
                .with_field(
                    FieldDef::embedded("anotherName", "Name")
                        .with_embedded_column("first", "anotherFirst")
                        .with_embedded_column("last", "anotherLast"),
                )
                .with_field(FieldDef::new("age", FieldType::Scalar(ScalarType::Int32))),
        )
        .unwrap();
    catalog
}

/// Insert a book and return the object and its key.
pub fn insert_book(session: &mut Session<'_>, title: &str, author: &str, isbn: &str) -> (ObjectId, Key) {
    let book = session.create("Book").unwrap();
    let objects = session.objects_mut();
    objects.set(book, "title", title).unwrap();
    objects.set(book, "author", author).unwrap();
    objects.set(book, "isbn", isbn).unwrap();
    session.insert_object(book).unwrap();
    let key = session.objects().key_of(book).cloned().unwrap();
    (book, key)
}

/// The five books every query test starts from.
pub fn insert_books(session: &mut Session<'_>) -> Vec<Key> {
    [
        ("Bar Book", "Joe Blow", "67890"),
        ("Bar Book", "Joe Blow", "11111"),
        ("Foo Book", "Joe Blow", "12345"),
        ("A Book", "Jane Blow", "11111"),
        ("Baz Book", "Jane Blow", "11112"),
    ]
    .into_iter()
    .map(|(title, author, isbn)| insert_book(session, title, author, isbn).1)
    .collect()
}

/// Wraps a datastore, counting queries and failing iteration after a
/// number of results.
pub struct FailingDatastore<'a> {
    inner: &'a dyn Datastore,
    fail_after: Option<usize>,
    queries: Cell<usize>,
}

impl<'a> FailingDatastore<'a> {
    pub fn new(inner: &'a dyn Datastore) -> Self {
        Self {
            inner,
            fail_after: None,
            queries: Cell::new(0),
        }
    }

    pub fn failing_after(mut self, results: usize) -> Self {
        self.fail_after = Some(results);
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl Datastore for FailingDatastore<'_> {
    fn get(&self, key: &Key) -> Result<Option<Record>, DatastoreError> {
        self.inner.get(key)
    }

    fn put(&self, record: Record) -> Result<Key, DatastoreError> {
        self.inner.put(record)
    }

    fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        self.inner.delete(key)
    }

    fn run_query(
        &self,
        query: &DatastoreQuery,
        options: &FetchOptions,
    ) -> Result<RecordStream<'_>, DatastoreError> {
        self.queries.set(self.queries.get() + 1);
        let fail_after = self.fail_after;
        let stream = self.inner.run_query(query, options)?;
        Ok(Box::new(stream.enumerate().map(move |(i, record)| {
            match fail_after {
                Some(limit) if i >= limit => {
                    Err(DatastoreError::Unavailable("connection reset".to_string()))
                }
                _ => record,
            }
        })))
    }
}
