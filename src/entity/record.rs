use super::{EntityState, EntityTypeInfo, ExtraMetadata, TrackedEntity};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Plain in-memory [`TrackedEntity`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    entity_type: Arc<EntityTypeInfo>,
    state: EntityState,
    values: JsonMap<String, JsonValue>,
    changed: BTreeSet<String>,
    extra_metadata: Option<ExtraMetadata>,
}

impl EntityRecord {
    fn with_state(entity_type: Arc<EntityTypeInfo>, values: JsonMap<String, JsonValue>, state: EntityState) -> Self {
        Self {
            entity_type,
            state,
            values,
            changed: BTreeSet::new(),
            extra_metadata: None,
        }
    }

    /// A new entity, not yet known to the server.
    pub fn added(entity_type: Arc<EntityTypeInfo>, values: JsonMap<String, JsonValue>) -> Self {
        Self::with_state(entity_type, values, EntityState::Added)
    }

    /// An entity as last fetched from the server.
    pub fn unchanged(entity_type: Arc<EntityTypeInfo>, values: JsonMap<String, JsonValue>) -> Self {
        Self::with_state(entity_type, values, EntityState::Unchanged)
    }

    pub fn with_extra_metadata(mut self, metadata: ExtraMetadata) -> Self {
        self.extra_metadata = Some(metadata);
        self
    }

    /// Set a field; unchanged entities become modified.
    pub fn set(&mut self, property: &str, value: JsonValue) {
        self.values.insert(property.to_string(), value);
        if self.state != EntityState::Added {
            self.changed.insert(property.to_string());
        }
        if self.state == EntityState::Unchanged {
            self.state = EntityState::Modified;
        }
    }

    pub fn mark_deleted(&mut self) {
        self.state = EntityState::Deleted;
    }

    pub fn values(&self) -> &JsonMap<String, JsonValue> {
        &self.values
    }
}

impl TrackedEntity for EntityRecord {
    fn state(&self) -> EntityState {
        self.state
    }

    fn entity_type(&self) -> &EntityTypeInfo {
        &self.entity_type
    }

    fn value(&self, property: &str) -> Option<&JsonValue> {
        self.values.get(property)
    }

    fn changed_properties(&self) -> Vec<&str> {
        self.changed.iter().map(String::as_str).collect()
    }

    fn extra_metadata(&self) -> Option<&ExtraMetadata> {
        self.extra_metadata.as_ref()
    }

    fn set_extra_metadata(&mut self, metadata: ExtraMetadata) {
        self.extra_metadata = Some(metadata);
    }
}
