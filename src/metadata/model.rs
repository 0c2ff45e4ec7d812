//! Schema description as delivered by the metadata endpoint.
//!
//! Every struct keeps the fields it does not interpret in `extra`, so whatever
//! the server sent reaches the metadata store untouched.

use super::key_shape::{KeyShape, PropertyRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsdlMetadata {
    pub data_services: DataServices,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl CsdlMetadata {
    /// The single merged schema, once normalization has run.
    pub fn schema(&self) -> Option<&SchemaSegment> {
        self.data_services.schema.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataServices {
    #[serde(default)]
    pub schema: Vec<SchemaSegment>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// One namespace worth of declarations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSegment {
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<Vec<EntityTypeDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_container: Option<EntityContainer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<Vec<AssociationDescriptor>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl SchemaSegment {
    /// Overwrite this segment's properties with every property present on
    /// `other`, except the namespace.
    pub fn absorb(&mut self, other: SchemaSegment) {
        if other.entity_type.is_some() {
            self.entity_type = other.entity_type;
        }
        if other.entity_container.is_some() {
            self.entity_container = other.entity_container;
        }
        if other.association.is_some() {
            self.association = other.association;
        }
        self.extra.extend(other.extra);
    }

    pub fn entity_types(&self) -> &[EntityTypeDescriptor] {
        self.entity_type.as_deref().unwrap_or_default()
    }

    pub fn find_entity_type(&self, short_name: &str) -> Option<&EntityTypeDescriptor> {
        self.entity_types().iter().find(|t| t.name == short_name)
    }

    pub fn associations(&self) -> &[AssociationDescriptor] {
        self.association.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyShape>,
    #[serde(default)]
    pub navigation_property: Vec<NavigationPropertyDescriptor>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl EntityTypeDescriptor {
    pub fn key_property_refs(&self) -> &[PropertyRef] {
        self.key.as_ref().map(KeyShape::property_refs).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPropertyDescriptor {
    pub name: String,
    /// Target type, `Collection(..)`-wrapped for the many side.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_role: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityContainer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entity_set: Vec<EntitySet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub association_set: Vec<AssociationDescriptor>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl EntityContainer {
    /// Name of the set whose declared entity type is `qualified_type`.
    pub fn entity_set_for(&self, qualified_type: &str) -> Option<&str> {
        self.entity_set
            .iter()
            .find(|set| set.entity_type == qualified_type)
            .map(|set| set.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    #[serde(rename = "*")]
    Many,
    #[serde(rename = "1")]
    One,
}

/// Relationship between two entity types, synthesized during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationDescriptor {
    pub association: String,
    pub name: String,
    /// Many end first, one end second.
    pub end: [AssociationEnd; 2],
    pub referential_constraint: ReferentialConstraint,
}

impl AssociationDescriptor {
    pub fn source_role(&self) -> &str {
        &self.end[0].role
    }

    pub fn target_role(&self) -> &str {
        &self.end[1].role
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    #[serde(default)]
    pub entity_set: Option<String>,
    pub multiplicity: Multiplicity,
    pub role: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentialConstraint {
    pub dependent: ConstraintRole,
    pub principal: ConstraintRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRole {
    pub property_ref: Vec<PropertyRef>,
    pub role: String,
}
