//! Protocol error types.

use thiserror::Error;

/// Errors raised while building, encoding or decoding record-model values.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A string could not be decoded into a key.
    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    /// A child key was requested under a parent that has no id or name yet.
    #[error("cannot create a child of incomplete key {0}")]
    IncompleteParent(String),
}
