//! Entity-state contract
//!
//! The client keeps entities in its own state model. The adapter only needs a
//! narrow view of each pending entity, expressed by [`TrackedEntity`]:
//! its change state, type description, field values and the identity
//! metadata cached from earlier round-trips.

mod data_type;
mod record;

pub use data_type::DataType;
pub use record::EntityRecord;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
    Unchanged,
    Detached,
}

/// How an entity type obtains its key on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoGeneratedKeyType {
    #[default]
    None,
    Identity,
    KeyGenerator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProperty {
    pub name: String,
    pub name_on_server: String,
    pub data_type: DataType,
    /// Client-only field, never sent to the server.
    pub is_unmapped: bool,
}

impl DataProperty {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            name_on_server: name.clone(),
            name,
            data_type,
            is_unmapped: false,
        }
    }

    pub fn on_server(mut self, name_on_server: impl Into<String>) -> Self {
        self.name_on_server = name_on_server.into();
        self
    }

    pub fn unmapped(mut self) -> Self {
        self.is_unmapped = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeInfo {
    pub name: String,
    pub default_resource_name: String,
    pub data_properties: Vec<DataProperty>,
    /// Names of the key properties, in key order.
    pub key_names: Vec<String>,
    pub auto_generated_key: AutoGeneratedKeyType,
}

impl EntityTypeInfo {
    pub fn new(name: impl Into<String>, default_resource_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_resource_name: default_resource_name.into(),
            data_properties: Vec::new(),
            key_names: Vec::new(),
            auto_generated_key: AutoGeneratedKeyType::None,
        }
    }

    pub fn property(mut self, property: DataProperty) -> Self {
        self.data_properties.push(property);
        self
    }

    pub fn key(mut self, property: DataProperty) -> Self {
        self.key_names.push(property.name.clone());
        self.data_properties.push(property);
        self
    }

    pub fn auto_generated(mut self, key_type: AutoGeneratedKeyType) -> Self {
        self.auto_generated_key = key_type;
        self
    }

    pub fn get_property(&self, name: &str) -> Option<&DataProperty> {
        self.data_properties.iter().find(|p| p.name == name)
    }

    pub fn key_properties(&self) -> Vec<&DataProperty> {
        self.key_names
            .iter()
            .filter_map(|name| self.get_property(name))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type_name: String,
    pub values: Vec<JsonValue>,
}

/// Identity metadata cached on an entity between round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtraMetadata {
    pub uri_key: Option<String>,
    /// Concurrency token echoed as `If-Match`.
    pub etag: Option<String>,
}

pub trait TrackedEntity {
    fn state(&self) -> EntityState;

    fn entity_type(&self) -> &EntityTypeInfo;

    fn value(&self, property: &str) -> Option<&JsonValue>;

    /// Names of the properties modified since the entity was last saved.
    fn changed_properties(&self) -> Vec<&str>;

    fn extra_metadata(&self) -> Option<&ExtraMetadata>;

    fn set_extra_metadata(&mut self, metadata: ExtraMetadata);

    fn key(&self) -> EntityKey {
        let entity_type = self.entity_type();
        EntityKey {
            entity_type_name: entity_type.name.clone(),
            values: entity_type
                .key_names
                .iter()
                .map(|name| self.value(name).cloned().unwrap_or(JsonValue::Null))
                .collect(),
        }
    }
}
