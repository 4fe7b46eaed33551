//! Query execution against a datastore.
//!
//! The executor takes a translated query and runs it in a session, returning
//! loaded objects, projected values or a count.

use super::translator::{ResultShape, TranslatedQuery};
use crate::error::Error;
use crate::object::{FieldValue, ObjectId};
use crate::persist::Session;
use crate::storage::FilterEvaluator;
use kindred_proto::{FetchOptions, Key, Record};
use tracing::debug;

/// Results of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Loaded candidate objects.
    Objects(Vec<ObjectId>),
    /// One projected value per result.
    Values(Vec<FieldValue>),
    /// Several projected values per result.
    Tuples(Vec<Vec<FieldValue>>),
    /// Number of results.
    Count(usize),
}

impl QueryResult {
    /// Number of results. A count reports the counted number.
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Objects(ids) => ids.len(),
            QueryResult::Values(values) => values.len(),
            QueryResult::Tuples(rows) => rows.len(),
            QueryResult::Count(count) => *count,
        }
    }

    /// Check whether there are no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loaded objects, for object queries.
    pub fn objects(&self) -> Option<&[ObjectId]> {
        match self {
            QueryResult::Objects(ids) => Some(ids),
            _ => None,
        }
    }

    /// Projected values, for single-field projections.
    pub fn values(&self) -> Option<&[FieldValue]> {
        match self {
            QueryResult::Values(values) => Some(values),
            _ => None,
        }
    }

    /// Projected rows, for multi-field projections.
    pub fn tuples(&self) -> Option<&[Vec<FieldValue>]> {
        match self {
            QueryResult::Tuples(rows) => Some(rows),
            _ => None,
        }
    }

    /// The count, for count queries.
    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(count) => Some(*count),
            _ => None,
        }
    }

    fn empty(shape: &ResultShape) -> Self {
        match shape {
            ResultShape::Objects => QueryResult::Objects(Vec::new()),
            ResultShape::Count => QueryResult::Count(0),
            ResultShape::Fields(fields) if fields.len() == 1 => QueryResult::Values(Vec::new()),
            ResultShape::Fields(_) => QueryResult::Tuples(Vec::new()),
        }
    }
}

/// Runs translated queries in a session.
pub struct QueryExecutor<'s, 'a> {
    session: &'s mut Session<'a>,
}

impl<'s, 'a> QueryExecutor<'s, 'a> {
    /// Create an executor.
    pub fn new(session: &'s mut Session<'a>) -> Self {
        Self { session }
    }

    /// Execute a translated query with a result window.
    ///
    /// Datastore failures, including those raised while iterating results,
    /// come back as [`Error::Datastore`].
    pub fn execute(
        &mut self,
        translated: &TranslatedQuery,
        options: &FetchOptions,
    ) -> Result<QueryResult, Error> {
        if translated.result == ResultShape::Count && options.offset > 0 {
            return Err(Error::UnsupportedFeature(
                "count with a first result offset".to_string(),
            ));
        }
        if options.limit == Some(0) {
            return Ok(QueryResult::empty(&translated.result));
        }

        let records = match &translated.batch_keys {
            Some(keys) => self.get_batch(translated, keys, options)?,
            None if translated.result == ResultShape::Count => {
                let count = self.session.datastore().count(&translated.query, options)?;
                debug!(kind = %translated.query.kind, count, "counted query results");
                return Ok(QueryResult::Count(count));
            }
            None => self.run(translated, options)?,
        };

        match &translated.result {
            ResultShape::Count => Ok(QueryResult::Count(records.len())),
            ResultShape::Objects => Ok(QueryResult::Objects(
                self.session.loader().load_all(records)?,
            )),
            ResultShape::Fields(fields) => {
                let ids = self.session.loader().load_all(records)?;
                self.project(&ids, fields)
            }
        }
    }

    fn run(&self, translated: &TranslatedQuery, options: &FetchOptions) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        for record in self.session.datastore().run_query(&translated.query, options)? {
            records.push(record?);
        }
        debug!(kind = %translated.query.kind, results = records.len(), "ran query");
        Ok(records)
    }

    /// Get records by key, then apply the native filters, sorts and window
    /// in process. Keys of other kinds and missing records are skipped.
    fn get_batch(
        &self,
        translated: &TranslatedQuery,
        keys: &[Key],
        options: &FetchOptions,
    ) -> Result<Vec<Record>, Error> {
        let query = &translated.query;
        let wanted: Vec<Key> = keys
            .iter()
            .filter(|key| key.kind() == query.kind)
            .cloned()
            .collect();
        let mut found = self.session.datastore().get_many(&wanted)?;
        debug!(kind = %query.kind, requested = keys.len(), found = found.len(), "batch get");

        let mut records: Vec<Record> = wanted
            .iter()
            .filter_map(|key| found.remove(key))
            .filter(|record| {
                query.ancestor.as_ref().map_or(true, |ancestor| {
                    *ancestor == record.key || ancestor.is_ancestor_of(&record.key)
                })
            })
            .filter(|record| FilterEvaluator::matches_all(record, &query.filters))
            .collect();
        if !query.sorts.is_empty() {
            FilterEvaluator::sort_records(&mut records, &query.sorts);
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(records.into_iter().skip(options.offset).take(limit).collect())
    }

    fn project(&self, ids: &[ObjectId], fields: &[usize]) -> Result<QueryResult, Error> {
        let objects = self.session.objects();
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let row = fields
                .iter()
                .map(|number| objects.field_at(*id, *number).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        if let [_] = fields {
            Ok(QueryResult::Values(rows.into_iter().flatten().collect()))
        } else {
            Ok(QueryResult::Tuples(rows))
        }
    }
}
