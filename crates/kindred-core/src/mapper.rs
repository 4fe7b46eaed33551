//! The mapper: validated metadata and services shared by every unit of work.

use crate::catalog::Catalog;
use crate::config::MapperConfig;
use crate::error::Error;
use crate::persist::Session;
use crate::serialization::SerializerRegistry;
use crate::storage::Datastore;
use std::sync::Arc;
use tracing::info;

/// Entry point of the mapping layer.
///
/// Holds the catalog, the serialization registry and the configuration.
/// Construction validates the catalog against the registry, so a mapper that
/// exists is known to be usable.
#[derive(Debug, Clone)]
pub struct Mapper {
    catalog: Arc<Catalog>,
    serializers: SerializerRegistry,
    config: MapperConfig,
}

impl Mapper {
    /// Create a mapper with the built-in serialization strategies.
    pub fn new(catalog: Catalog, config: MapperConfig) -> Result<Self, Error> {
        let serializers = SerializerRegistry::new(config.default_serialization_strategy.clone());
        Self::with_serializers(catalog, config, serializers)
    }

    /// Create a mapper with a custom serialization registry.
    ///
    /// The registry's default strategy is replaced by the one the configuration names.
    pub fn with_serializers(
        catalog: Catalog,
        config: MapperConfig,
        serializers: SerializerRegistry,
    ) -> Result<Self, Error> {
        let serializers = serializers.with_default(config.default_serialization_strategy.clone());
        serializers.validate(&catalog)?;
        info!(
            entities = catalog.entity_names().len(),
            storage_version = ?config.storage_version,
            default_serialization = %config.default_serialization_strategy,
            "created mapper"
        );
        Ok(Self {
            catalog: Arc::new(catalog),
            serializers,
            config,
        })
    }

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle to the catalog.
    pub fn catalog_arc(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// The serialization registry.
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// The configuration.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Start a unit of work against a datastore.
    pub fn session<'a>(&'a self, datastore: &'a dyn Datastore) -> Session<'a> {
        Session::new(self, datastore)
    }
}
