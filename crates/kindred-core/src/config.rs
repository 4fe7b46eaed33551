//! Mapper configuration.

use crate::error::Error;
use serde::Deserialize;

/// On-disk format generation for one-to-many relations.
///
/// Versions are ordered; later versions include the behavior of earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
pub enum StorageVersion {
    /// Children are found by ancestor query only.
    Legacy,
    /// Owners store the ordered list of child keys, but reads still use
    /// ancestor queries.
    WriteChildKeys,
    /// Owners store the list of child keys and reads consult it.
    #[default]
    ReadChildKeys,
}

impl StorageVersion {
    /// Check whether owners write their child key lists.
    pub fn writes_child_keys(&self) -> bool {
        *self >= StorageVersion::WriteChildKeys
    }

    /// Check whether child fetches read the owner's key list.
    pub fn reads_child_keys(&self) -> bool {
        *self >= StorageVersion::ReadChildKeys
    }
}

/// Configuration for a [`Mapper`](crate::Mapper).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Storage format generation for relations.
    pub storage_version: StorageVersion,

    /// Serialization strategy used by fields that do not name one.
    pub default_serialization_strategy: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            storage_version: StorageVersion::default(),
            default_serialization_strategy: crate::serialization::BINARY_STRATEGY.to_string(),
        }
    }
}

impl MapperConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidArgument(format!("mapper config: {e}")))
    }

    /// Set the storage version.
    pub fn with_storage_version(mut self, version: StorageVersion) -> Self {
        self.storage_version = version;
        self
    }

    /// Set the default serialization strategy.
    pub fn with_default_serialization_strategy(mut self, id: impl Into<String>) -> Self {
        self.default_serialization_strategy = id.into();
        self
    }
}
