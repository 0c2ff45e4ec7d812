use super::model::CsdlMetadata;
use crate::core::{AdapterError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Receiving end for normalized metadata.
///
/// Import is guarded rather than idempotent: callers ask
/// [`has_metadata_for`](MetadataStore::has_metadata_for) right before
/// importing, and a fetch that lost the race discards its result.
pub trait MetadataStore: Send + Sync {
    fn has_metadata_for(&self, service_name: &str) -> Result<bool>;

    /// `Err` carries the store's reason for rejecting the metadata.
    fn import_metadata(&self, service_name: &str, metadata: &CsdlMetadata) -> std::result::Result<(), String>;

    fn add_data_service(&self, service_name: &str) -> Result<()>;
}

/// Process-local [`MetadataStore`].
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    metadata: RwLock<HashMap<String, CsdlMetadata>>,
    data_services: RwLock<HashSet<String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_for(&self, service_name: &str) -> Result<Option<CsdlMetadata>> {
        Ok(self.metadata.read()?.get(service_name).cloned())
    }

    pub fn has_data_service(&self, service_name: &str) -> Result<bool> {
        Ok(self.data_services.read()?.contains(service_name))
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn has_metadata_for(&self, service_name: &str) -> Result<bool> {
        Ok(self.metadata.read()?.contains_key(service_name))
    }

    fn import_metadata(&self, service_name: &str, metadata: &CsdlMetadata) -> std::result::Result<(), String> {
        if metadata.schema().is_none() {
            return Err("metadata holds no schema".to_string());
        }
        let mut guard = self
            .metadata
            .write()
            .map_err(|e| AdapterError::from(e).to_string())?;
        guard.insert(service_name.to_string(), metadata.clone());
        Ok(())
    }

    fn add_data_service(&self, service_name: &str) -> Result<()> {
        self.data_services.write()?.insert(service_name.to_string());
        Ok(())
    }
}
