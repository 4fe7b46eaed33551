//! Query translation and execution.
//!
//! A [`QueryExpr`] from the query-language front end is translated into a
//! native [`DatastoreQuery`](kindred_proto::DatastoreQuery) by the
//! [`QueryTranslator`], which rejects anything the datastore cannot evaluate.
//! The [`QueryExecutor`] runs the result in a session. [`Query`] ties both
//! together with parameters and a result window.

mod executor;
mod expr;
mod runtime;
mod translator;

pub use executor::{QueryExecutor, QueryResult};
pub use expr::{
    AggregateFunction, Expr, Operator, OrderDirection, OrderSpec, QueryExpr, ResultExpr,
};
pub use runtime::Query;
pub use translator::{QueryTranslator, ResultShape, TranslatedQuery};
