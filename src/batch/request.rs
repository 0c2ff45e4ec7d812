use super::{CONTENT_TYPE_HEADER, ChangeRequest, ChangeRequestInterceptor, IF_MATCH_HEADER};
use crate::core::{AdapterError, Headers, Result};
use crate::entity::{
    AutoGeneratedKeyType, DataProperty, DataType, EntityKey, EntityState, TrackedEntity,
};
use chrono::{DateTime, Duration, FixedOffset, Local, Offset, SecondsFormat, TimeZone, Utc};
use http::Method;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use tracing::{Level, event};

/// Temporary key of a created entity, kept until the server assigns the real one.
#[derive(Debug, Clone, PartialEq)]
pub struct TempKeyRecord {
    pub entity_type_name: String,
    pub auto_generated_key: AutoGeneratedKeyType,
    /// Server-side name of the first key property.
    pub key_name_on_server: Option<String>,
    pub temp_value: JsonValue,
}

/// Reference back to an entity of the save bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalEntity {
    pub bundle_index: usize,
    pub key: EntityKey,
}

/// Lookup tables of one save round-trip, keyed by content id.
#[derive(Debug, Clone, Default)]
pub struct CorrelationTables {
    temp_keys: HashMap<usize, TempKeyRecord>,
    originals: HashMap<usize, OriginalEntity>,
    /// Content ids in the order the operations were sent.
    sent_order: Vec<usize>,
}

impl CorrelationTables {
    pub fn temp_key(&self, content_id: usize) -> Option<&TempKeyRecord> {
        self.temp_keys.get(&content_id)
    }

    pub fn original(&self, content_id: usize) -> Option<&OriginalEntity> {
        self.originals.get(&content_id)
    }

    pub fn operation_count(&self) -> usize {
        self.sent_order.len()
    }

    /// Content id of the operation sent at `position`.
    ///
    /// Servers keep operation order inside a change group, so this is
    /// `position + 1` unless an interceptor reordered the operations.
    pub fn content_id_at(&self, position: usize) -> Option<usize> {
        self.sent_order.get(position).copied()
    }
}

#[derive(Debug, Clone)]
pub struct BuiltBatch {
    pub requests: Vec<ChangeRequest>,
    pub tables: CorrelationTables,
}

/// Turns pending entities into change operations.
#[derive(Debug, Clone)]
pub struct BatchRequestBuilder<'a> {
    route_prefix: &'a str,
    content_type: &'a str,
    /// Pinned offset; `None` reads the host's offset at each value's instant.
    local_offset: Option<FixedOffset>,
}

impl<'a> BatchRequestBuilder<'a> {
    pub fn new(route_prefix: &'a str, content_type: &'a str, local_offset: Option<FixedOffset>) -> Self {
        Self {
            route_prefix,
            content_type,
            local_offset,
        }
    }

    /// Build the change group for `bundle`.
    ///
    /// Only added, modified and deleted entities produce operations. Content
    /// ids are assigned to produced operations only, starting at 1; some
    /// servers ignore a content id of 0.
    pub fn build<E: TrackedEntity>(
        &self,
        bundle: &mut [E],
        interceptor: &mut dyn ChangeRequestInterceptor,
    ) -> Result<BuiltBatch> {
        let mut requests = Vec::new();
        let mut tables = CorrelationTables::default();
        let mut content_id = 0;

        for (index, entity) in bundle.iter_mut().enumerate() {
            let state = entity.state();
            if !matches!(state, EntityState::Added | EntityState::Modified | EntityState::Deleted) {
                continue;
            }
            content_id += 1;

            let mut headers = Headers::new();
            headers.insert(CONTENT_TYPE_HEADER.to_string(), self.content_type.to_string());

            let (method, request_uri, body) = match state {
                EntityState::Added => {
                    tables.temp_keys.insert(content_id, temp_key_record(&*entity));
                    let uri = format!("{}{}", self.route_prefix, entity.entity_type().default_resource_name);
                    (Method::POST, uri, Some(self.full_body(&*entity)))
                }
                EntityState::Modified => {
                    let uri = self.target_uri(entity, &mut headers)?;
                    (Method::PATCH, uri, Some(self.changed_body(&*entity)))
                }
                _ => (Method::DELETE, self.target_uri(entity, &mut headers)?, None),
            };

            tables.originals.insert(
                content_id,
                OriginalEntity {
                    bundle_index: index,
                    key: entity.key(),
                },
            );

            let request = ChangeRequest {
                content_id,
                method,
                request_uri,
                headers,
                body,
            };
            requests.push(interceptor.get_request(request, &*entity, index));
        }

        interceptor.done(&mut requests);
        tables.sent_order = requests.iter().map(|request| request.content_id).collect();

        event!(
            Level::DEBUG,
            operations = requests.len(),
            creates = tables.temp_keys.len(),
            "change group built"
        );
        Ok(BuiltBatch { requests, tables })
    }

    fn full_body<E: TrackedEntity>(&self, entity: &E) -> JsonMap<String, JsonValue> {
        let mut body = JsonMap::new();
        for property in &entity.entity_type().data_properties {
            if let Some(value) = self.transform_value(property, entity.value(&property.name)) {
                body.insert(property.name_on_server.clone(), value);
            }
        }
        body
    }

    fn changed_body<E: TrackedEntity>(&self, entity: &E) -> JsonMap<String, JsonValue> {
        let entity_type = entity.entity_type();
        let mut body = JsonMap::new();
        for name in entity.changed_properties() {
            let Some(property) = entity_type.get_property(name) else {
                continue;
            };
            if let Some(value) = self.transform_value(property, entity.value(name)) {
                body.insert(property.name_on_server.clone(), value);
            }
        }
        body
    }

    /// Outgoing value of one property; `None` drops the property from the body.
    fn transform_value(&self, property: &DataProperty, value: Option<&JsonValue>) -> Option<JsonValue> {
        if property.is_unmapped {
            return None;
        }
        let value = value?;
        let transformed = match (property.data_type, value) {
            (DataType::DateTimeOffset, JsonValue::String(text)) => {
                rebase_date_time_offset(text, |instant| self.offset_at(instant))
                    .map(JsonValue::String)
                    .unwrap_or_else(|| value.clone())
            }
            (data_type, JsonValue::Number(n)) if data_type.quotes_json() => JsonValue::String(n.to_string()),
            _ => value.clone(),
        };
        Some(transformed)
    }

    fn offset_at(&self, instant: &DateTime<Utc>) -> FixedOffset {
        match self.local_offset {
            Some(offset) => offset,
            None => Local.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// Target URI for updates and deletes, derived once and cached on the entity.
    fn target_uri<E: TrackedEntity>(&self, entity: &mut E, headers: &mut Headers) -> Result<String> {
        let mut metadata = entity.extra_metadata().cloned().unwrap_or_default();
        if let Some(etag) = &metadata.etag {
            headers.insert(IF_MATCH_HEADER.to_string(), etag.clone());
        }

        let uri_key = match metadata.uri_key.clone() {
            Some(uri_key) => uri_key,
            None => {
                let uri_key = derive_uri_key(&*entity)?;
                metadata.uri_key = Some(uri_key.clone());
                entity.set_extra_metadata(metadata);
                uri_key
            }
        };

        if is_absolute(&uri_key) {
            Ok(uri_key)
        } else {
            Ok(format!("{}{}", self.route_prefix, uri_key))
        }
    }
}

fn temp_key_record<E: TrackedEntity>(entity: &E) -> TempKeyRecord {
    let entity_type = entity.entity_type();
    TempKeyRecord {
        entity_type_name: entity_type.name.clone(),
        auto_generated_key: entity_type.auto_generated_key,
        key_name_on_server: entity_type
            .key_properties()
            .first()
            .map(|property| property.name_on_server.clone()),
        temp_value: entity.key().values.into_iter().next().unwrap_or(JsonValue::Null),
    }
}

/// `Resource(value)` for a single key, `Resource(a=1,b='x')` for composite keys.
fn derive_uri_key<E: TrackedEntity>(entity: &E) -> Result<String> {
    let entity_type = entity.entity_type();
    let key_properties = entity_type.key_properties();
    if key_properties.is_empty() {
        return Err(AdapterError::InvalidRequest(format!(
            "Entity type '{}' declares no key properties",
            entity_type.name
        )));
    }

    let literal = |property: &DataProperty| -> Result<String> {
        let value = entity
            .value(&property.name)
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                AdapterError::InvalidRequest(format!(
                    "Key property '{}' of '{}' has no value",
                    property.name, entity_type.name
                ))
            })?;
        Ok(property.data_type.fmt_odata_literal(value))
    };

    let key = if let [single] = key_properties.as_slice() {
        literal(single)?
    } else {
        key_properties
            .iter()
            .map(|property| Ok(format!("{}={}", property.name_on_server, literal(property)?)))
            .collect::<Result<Vec<_>>>()?
            .join(",")
    };
    Ok(format!("{}({})", entity_type.default_resource_name, key))
}

/// A scheme marker means the key came from an absolute link.
fn is_absolute(uri_key: &str) -> bool {
    uri_key.find("//").is_some_and(|position| position > 0)
}

/// Shift a timezone-aware instant by the local offset so the transport's own
/// conversion lands on the wall-clock value the user entered.
///
/// The offset is the one in effect at the value's own instant, so dates on
/// either side of a daylight-saving change shift by different amounts.
fn rebase_date_time_offset(text: &str, offset_at: impl Fn(&DateTime<Utc>) -> FixedOffset) -> Option<String> {
    let instant = DateTime::parse_from_rfc3339(text).ok()?.with_timezone(&Utc);
    let rebased = instant + Duration::seconds(i64::from(offset_at(&instant).local_minus_utc()));
    Some(rebased.to_rfc3339_opts(SecondsFormat::Millis, true))
}
