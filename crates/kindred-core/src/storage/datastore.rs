//! The datastore seam.

use crate::error::DatastoreError;
use kindred_proto::{DatastoreQuery, FetchOptions, Key, Record};
use std::collections::HashMap;

/// Stream of query results. Failures may surface partway through.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record, DatastoreError>> + 'a>;

/// A hierarchical key-value datastore.
///
/// Calls are synchronous and are not retried by callers in this crate.
pub trait Datastore {
    /// Get a record by key.
    fn get(&self, key: &Key) -> Result<Option<Record>, DatastoreError>;

    /// Get several records by key. Missing keys are absent from the result.
    fn get_many(&self, keys: &[Key]) -> Result<HashMap<Key, Record>, DatastoreError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.get(key)? {
                found.insert(key.clone(), record);
            }
        }
        Ok(found)
    }

    /// Write a record, replacing any record with the same key.
    ///
    /// An incomplete key is completed with a newly allocated id. Returns the
    /// key the record was written under.
    fn put(&self, record: Record) -> Result<Key, DatastoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(&self, key: &Key) -> Result<(), DatastoreError>;

    /// Run a query.
    fn run_query(
        &self,
        query: &DatastoreQuery,
        options: &FetchOptions,
    ) -> Result<RecordStream<'_>, DatastoreError>;

    /// Count the results of a query.
    fn count(&self, query: &DatastoreQuery, options: &FetchOptions) -> Result<usize, DatastoreError> {
        let mut count = 0;
        for record in self.run_query(query, options)? {
            record?;
            count += 1;
        }
        Ok(count)
    }
}
