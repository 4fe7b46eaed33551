//! Storage engine implementation.

use super::datastore::{Datastore, RecordStream};
use super::filter::FilterEvaluator;
use super::StorageConfig;
use crate::error::DatastoreError;
use kindred_proto::{DatastoreQuery, FetchOptions, Key, Record};
use sled::{Db, Tree};
use tracing::{debug, info};

/// Prefix of the per-kind record trees.
const KIND_TREE_PREFIX: &str = "kind:";

/// Reference datastore over sled.
///
/// Records of each kind live in their own tree, keyed by the encoded record
/// key. Queries scan the kind's tree and evaluate filters in process, but
/// enforce the same restrictions a production datastore would.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, DatastoreError> {
        let sled_config = config.to_sled_config();
        let db = sled_config.open()?;
        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "opened storage engine"
        );
        Ok(Self { db })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), DatastoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, DatastoreError> {
        Ok(self.db.size_on_disk()?)
    }

    fn tree(&self, kind: &str) -> Result<Tree, DatastoreError> {
        Ok(self.db.open_tree(format!("{KIND_TREE_PREFIX}{kind}"))?)
    }

    fn allocate_id(&self) -> Result<i64, DatastoreError> {
        // ids start at 1
        let id = self.db.generate_id()?;
        i64::try_from(id + 1)
            .map_err(|_| DatastoreError::Unavailable("id space exhausted".to_string()))
    }

    /// Reject queries the datastore cannot answer.
    fn validate(query: &DatastoreQuery) -> Result<(), DatastoreError> {
        let inequalities = query.inequality_properties();
        if inequalities.len() > 1 {
            return Err(DatastoreError::BadRequest(format!(
                "inequality filters are limited to one property, found {}",
                inequalities.join(", ")
            )));
        }
        if let (Some(property), Some(first_sort)) = (inequalities.first(), query.sorts.first()) {
            if first_sort.property != *property {
                return Err(DatastoreError::BadRequest(format!(
                    "the first sort must be on the inequality property {property}, found {}",
                    first_sort.property
                )));
            }
        }
        Ok(())
    }

    fn scan(&self, query: &DatastoreQuery) -> Result<Vec<Record>, DatastoreError> {
        let tree = self.tree(&query.kind)?;
        let mut records = Vec::new();
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            let record = Record::from_bytes(&bytes)?;
            if let Some(ancestor) = &query.ancestor {
                if record.key != *ancestor && !ancestor.is_ancestor_of(&record.key) {
                    continue;
                }
            }
            if FilterEvaluator::matches_all(&record, &query.filters)
                && FilterEvaluator::has_sort_properties(&record, &query.sorts)
            {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl Datastore for StorageEngine {
    fn get(&self, key: &Key) -> Result<Option<Record>, DatastoreError> {
        let tree = self.tree(key.kind())?;
        match tree.get(key.to_encoded()?)? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, mut record: Record) -> Result<Key, DatastoreError> {
        if !record.key.is_complete() {
            record.key = record.key.with_id(self.allocate_id()?);
        }
        let tree = self.tree(record.kind())?;
        tree.insert(record.key.to_encoded()?, record.to_bytes()?)?;
        debug!(key = %record.key, properties = record.properties.len(), "put record");
        Ok(record.key)
    }

    fn delete(&self, key: &Key) -> Result<(), DatastoreError> {
        let tree = self.tree(key.kind())?;
        tree.remove(key.to_encoded()?)?;
        debug!(key = %key, "deleted record");
        Ok(())
    }

    fn run_query(
        &self,
        query: &DatastoreQuery,
        options: &FetchOptions,
    ) -> Result<RecordStream<'_>, DatastoreError> {
        Self::validate(query)?;

        let mut records = self.scan(query)?;
        FilterEvaluator::sort_records(&mut records, &query.sorts);

        let limit = options.limit.unwrap_or(usize::MAX);
        let keys_only = query.keys_only;
        let window = records
            .into_iter()
            .skip(options.offset)
            .take(limit)
            .map(move |mut record| {
                if keys_only {
                    record.properties.clear();
                }
                Ok::<_, DatastoreError>(record)
            });
        Ok(Box::new(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_proto::{FilterPredicate, KeyId, SortPredicate};

    struct TestDb {
        engine: StorageEngine,
        _dir: tempfile::TempDir, // Keep the temp dir alive
    }

    impl std::ops::Deref for TestDb {
        type Target = StorageEngine;
        fn deref(&self) -> &Self::Target {
            &self.engine
        }
    }

    fn test_engine() -> TestDb {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        TestDb { engine, _dir: dir }
    }

    fn collect(engine: &StorageEngine, query: &DatastoreQuery) -> Vec<Record> {
        engine
            .run_query(query, &FetchOptions::default())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_put_allocates_ids() {
        let engine = test_engine();
        let first = engine.put(Record::new(Key::incomplete("Book"))).unwrap();
        let second = engine.put(Record::new(Key::incomplete("Book"))).unwrap();

        assert!(first.is_complete());
        assert_ne!(first, second);
        assert!(first.id().unwrap() > 0);
    }

    #[test]
    fn test_put_and_get() {
        let engine = test_engine();
        let record = Record::new(Key::from_name("Book", "foo")).with_property("title", "Foo");
        let key = engine.put(record.clone()).unwrap();

        assert_eq!(key, record.key);
        assert_eq!(engine.get(&key).unwrap(), Some(record));
        assert_eq!(engine.get(&Key::from_name("Book", "bar")).unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let engine = test_engine();
        let key = engine.put(Record::new(Key::incomplete("Book"))).unwrap();
        engine.delete(&key).unwrap();
        assert_eq!(engine.get(&key).unwrap(), None);
        engine.delete(&key).unwrap();
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let key = {
            let engine = StorageEngine::open(StorageConfig::new(dir.path())).unwrap();
            let key = engine.put(Record::new(Key::incomplete("Book"))).unwrap();
            engine.flush().unwrap();
            key
        };
        let engine = StorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        assert!(engine.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_get_many_skips_missing() {
        let engine = test_engine();
        let a = engine.put(Record::new(Key::incomplete("Book"))).unwrap();
        let missing = Key::from_id("Book", 999_999);
        let found = engine.get_many(&[a.clone(), missing.clone()]).unwrap();
        assert!(found.contains_key(&a));
        assert!(!found.contains_key(&missing));
    }

    #[test]
    fn test_filter_sort_and_window() {
        let engine = test_engine();
        for (name, title, author) in [
            ("1", "Bar Book", "Joe Blow"),
            ("2", "Foo Book", "Joe Blow"),
            ("3", "A Book", "Jane Doe"),
            ("4", "Baz Book", "Joe Blow"),
        ] {
            engine
                .put(
                    Record::new(Key::from_name("Book", name))
                        .with_property("title", title)
                        .with_property("author", author),
                )
                .unwrap();
        }

        let query = DatastoreQuery::new("Book")
            .with_filter(FilterPredicate::eq("author", "Joe Blow"))
            .with_sort(SortPredicate::asc("title"));
        let titles: Vec<_> = collect(&engine, &query)
            .iter()
            .map(|r| r.property("title").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Bar Book", "Baz Book", "Foo Book"]);

        let window: Vec<_> = engine
            .run_query(&query, &FetchOptions::limit(1).with_offset(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].key, Key::from_name("Book", "4"));
        assert_eq!(engine.count(&query, &FetchOptions::default()).unwrap(), 3);
    }

    #[test]
    fn test_ancestor_query_includes_descendants() {
        let engine = test_engine();
        let root = Key::from_id("Node", 1);
        let child = root.child("Node", KeyId::Id(2)).unwrap();
        let grandchild = child.child("Node", KeyId::Id(3)).unwrap();
        let other = Key::from_id("Node", 4);
        for key in [&root, &child, &grandchild, &other] {
            engine.put(Record::new(key.clone())).unwrap();
        }

        let query = DatastoreQuery::new("Node").with_ancestor(child.clone());
        let keys: Vec<_> = collect(&engine, &query).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![child, grandchild]);
    }

    #[test]
    fn test_keys_only() {
        let engine = test_engine();
        engine
            .put(Record::new(Key::from_id("Book", 1)).with_property("title", "x"))
            .unwrap();
        let records = collect(&engine, &DatastoreQuery::new("Book").keys_only());
        assert!(records[0].properties.is_empty());
    }

    #[test]
    fn test_rejects_unanswerable_queries() {
        let engine = test_engine();
        let two_inequalities = DatastoreQuery::new("Book")
            .with_filter(FilterPredicate::gt("a", 1))
            .with_filter(FilterPredicate::lt("b", 1));
        assert!(matches!(
            engine.run_query(&two_inequalities, &FetchOptions::default()),
            Err(DatastoreError::BadRequest(_))
        ));

        let wrong_sort = DatastoreQuery::new("Book")
            .with_filter(FilterPredicate::gt("a", 1))
            .with_sort(SortPredicate::asc("b"));
        assert!(matches!(
            engine.run_query(&wrong_sort, &FetchOptions::default()),
            Err(DatastoreError::BadRequest(_))
        ));

        let same_property = DatastoreQuery::new("Book")
            .with_filter(FilterPredicate::gt("a", 1))
            .with_filter(FilterPredicate::lt("a", 5))
            .with_sort(SortPredicate::asc("a"));
        assert!(engine.run_query(&same_property, &FetchOptions::default()).is_ok());
    }
}
