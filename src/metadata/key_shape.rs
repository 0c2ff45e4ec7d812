//! Key shape adapter
//!
//! The wire carries an entity key as a list of key blocks. The consuming
//! store reads the key both as a single value (`key.propertyRef`) and as the
//! first element of a list (`key[0].propertyRef`). Everything else in the
//! normalizer works on one [`EntityKeyRef`]; this module is the only place
//! that knows about the dual representation.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::slice;

/// Index under which the consolidated key repeats itself.
const LIST_ALIAS_FIELD: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRef {
    pub name: String,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl PropertyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: JsonMap::new(),
        }
    }
}

/// One key block: the ordered key property references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKeyRef {
    #[serde(default)]
    pub property_ref: Vec<PropertyRef>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl EntityKeyRef {
    pub fn new(property_ref: Vec<PropertyRef>) -> Self {
        Self {
            property_ref,
            extra: JsonMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyShape {
    /// As received: a list of key blocks.
    Raw(Vec<EntityKeyRef>),
    /// After normalization: one key, also readable as a one-element list.
    Consolidated(EntityKeyRef),
}

impl KeyShape {
    /// Collapse the raw list to its first block. An empty list means no key.
    pub fn consolidate(self) -> Option<Self> {
        match self {
            Self::Raw(blocks) => blocks.into_iter().next().map(Self::Consolidated),
            consolidated => Some(consolidated),
        }
    }

    pub fn key(&self) -> Option<&EntityKeyRef> {
        match self {
            Self::Raw(blocks) => blocks.first(),
            Self::Consolidated(key) => Some(key),
        }
    }

    pub fn key_list(&self) -> &[EntityKeyRef] {
        match self {
            Self::Raw(blocks) => blocks,
            Self::Consolidated(key) => slice::from_ref(key),
        }
    }

    pub fn property_refs(&self) -> &[PropertyRef] {
        self.key().map(|key| key.property_ref.as_slice()).unwrap_or_default()
    }
}

impl Serialize for KeyShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Raw(blocks) => blocks.serialize(serializer),
            Self::Consolidated(key) => {
                let single = serde_json::to_value(key).map_err(S::Error::custom)?;
                let mut value = single.clone();
                if let JsonValue::Object(map) = &mut value {
                    map.insert(LIST_ALIAS_FIELD.to_string(), single);
                }
                value.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for KeyShape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::Array(blocks) => serde_json::from_value(JsonValue::Array(blocks))
                .map(Self::Raw)
                .map_err(D::Error::custom),
            JsonValue::Object(mut map) => {
                map.remove(LIST_ALIAS_FIELD);
                serde_json::from_value(JsonValue::Object(map))
                    .map(Self::Consolidated)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::custom(format!(
                "entity key must be a list or an object, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_list_consolidates_to_its_first_block() {
        let raw: KeyShape = serde_json::from_value(json!([{ "propertyRef": [{ "name": "Id" }] }])).unwrap();
        let shape = raw.consolidate().unwrap();
        assert!(matches!(shape, KeyShape::Consolidated(_)));
        assert_eq!(shape.property_refs()[0].name, "Id");
        assert_eq!(shape.key_list().len(), 1);
        assert_eq!(shape.key_list()[0], *shape.key().unwrap());
    }

    #[test]
    fn empty_raw_list_means_no_key() {
        assert_eq!(KeyShape::Raw(Vec::new()).consolidate(), None);
    }

    #[test]
    fn consolidated_key_serializes_both_access_paths_and_reads_back() {
        let shape = KeyShape::Consolidated(EntityKeyRef::new(vec![PropertyRef::new("Id")]));
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["propertyRef"][0]["name"], "Id");
        assert_eq!(value["0"]["propertyRef"][0]["name"], "Id");

        let back: KeyShape = serde_json::from_value(value).unwrap();
        assert_eq!(back, shape);
    }
}
