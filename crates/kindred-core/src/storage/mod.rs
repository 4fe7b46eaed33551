//! Storage layer.
//!
//! The [`Datastore`] trait is the seam to the backend. [`StorageEngine`] is a
//! sled-backed implementation that enforces the query restrictions of a
//! hierarchical datastore, used in tests and for embedded use.

mod config;
mod datastore;
mod engine;
mod filter;

pub use config::StorageConfig;
pub use datastore::{Datastore, RecordStream};
pub use engine::StorageEngine;
pub use filter::FilterEvaluator;
