//! The caller-facing query handle.

use super::executor::{QueryExecutor, QueryResult};
use super::expr::QueryExpr;
use super::translator::{QueryTranslator, TranslatedQuery};
use crate::error::Error;
use crate::object::FieldValue;
use crate::persist::Session;
use kindred_proto::{DatastoreQuery, FetchOptions};
use std::collections::BTreeMap;

/// A query with bound parameters and a result window.
///
/// The query is translated on every execution, so parameters can be rebound
/// between runs. The native form of the last executed query is kept for
/// inspection.
#[derive(Debug, Clone)]
pub struct Query {
    expr: QueryExpr,
    parameters: BTreeMap<String, FieldValue>,
    max_results: Option<usize>,
    first_result: usize,
    latest: Option<DatastoreQuery>,
}

impl Query {
    /// Create a query.
    pub fn new(expr: QueryExpr) -> Self {
        Self {
            expr,
            parameters: BTreeMap::new(),
            max_results: None,
            first_result: 0,
            latest: None,
        }
    }

    /// The parsed query.
    pub fn expr(&self) -> &QueryExpr {
        &self.expr
    }

    /// Bind a named parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Remove all parameter bindings.
    pub fn clear_parameters(&mut self) -> &mut Self {
        self.parameters.clear();
        self
    }

    /// Limit the number of results. Zero yields no results.
    pub fn set_max_results(&mut self, max: i64) -> Result<&mut Self, Error> {
        let max = usize::try_from(max)
            .map_err(|_| Error::InvalidArgument(format!("max results must not be negative, got {max}")))?;
        self.max_results = Some(max);
        Ok(self)
    }

    /// Skip leading results.
    pub fn set_first_result(&mut self, first: i64) -> Result<&mut Self, Error> {
        self.first_result = usize::try_from(first)
            .map_err(|_| Error::InvalidArgument(format!("first result must not be negative, got {first}")))?;
        Ok(self)
    }

    /// The result window.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            limit: self.max_results,
            offset: self.first_result,
        }
    }

    /// Translate the query against a session without running it.
    pub fn translate(&self, session: &Session<'_>) -> Result<TranslatedQuery, Error> {
        QueryTranslator::new(session.mapper().catalog(), session.objects(), &self.parameters)
            .translate(&self.expr)
    }

    /// Run the query.
    pub fn execute(&mut self, session: &mut Session<'_>) -> Result<QueryResult, Error> {
        let translated = self.translate(session)?;
        self.latest = Some(translated.query.clone());
        QueryExecutor::new(session).execute(&translated, &self.fetch_options())
    }

    /// The native query of the last execution.
    pub fn latest_datastore_query(&self) -> Option<&DatastoreQuery> {
        self.latest.as_ref()
    }
}
