use super::{BatchResult, CorrelationTables, KeyMapping, SavedEntity};
use crate::core::{AdapterError, Headers, Result, find_header};
use crate::entity::AutoGeneratedKeyType;
use crate::fault::FaultNormalizer;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

/// One decoded sub-response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeResponse {
    pub status_code: Option<u16>,
    pub status_text: String,
    pub headers: Headers,
    pub body: Option<String>,
    /// `body` parsed as JSON, when it was JSON.
    pub data: Option<JsonValue>,
}

impl ChangeResponse {
    /// Missing status codes count as failures.
    pub fn is_failure(&self) -> bool {
        self.status_code.is_none_or(|status| status >= 400)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Sub-responses of one change group, in wire order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseGroup {
    pub responses: Vec<ChangeResponse>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResponse {
    pub groups: Vec<ResponseGroup>,
}

/// Maps a grouped response back onto the operations that produced it.
///
/// Echoed `Content-ID` headers are not trusted. Each sub-response is matched
/// by position, relying on servers preserving operation order inside a
/// change group. The group is all-or-nothing: the first failed sub-response
/// aborts correlation and no partial result is returned.
#[derive(Debug, Clone, Copy)]
pub struct BatchResponseCorrelator<'a> {
    normalizer: &'a FaultNormalizer,
    url: Option<&'a str>,
}

impl<'a> BatchResponseCorrelator<'a> {
    pub fn new(normalizer: &'a FaultNormalizer, url: Option<&'a str>) -> Self {
        Self { normalizer, url }
    }

    pub fn correlate(&self, response: &BatchResponse, tables: &CorrelationTables) -> Result<BatchResult> {
        let group = match response.groups.as_slice() {
            [group] => group,
            groups => {
                self.fail_on_first_fault(groups)?;
                return Err(AdapterError::BatchFault(format!(
                    "expected one change group in the batch response, found {}",
                    groups.len()
                )));
            }
        };

        if group.responses.len() != tables.operation_count() {
            self.fail_on_first_fault(std::slice::from_ref(group))?;
            return Err(AdapterError::BatchFault(format!(
                "change group holds {} responses for {} operations",
                group.responses.len(),
                tables.operation_count()
            )));
        }

        let mut result = BatchResult::default();
        for (position, change) in group.responses.iter().enumerate() {
            if change.is_failure() {
                return Err(self.fault(position, change));
            }

            let content_id = tables.content_id_at(position).ok_or_else(|| {
                AdapterError::BatchFault(format!("no operation was sent at position {}", position))
            })?;

            match &change.data {
                Some(entity) => {
                    if let Some(mapping) = key_mapping(tables, content_id, entity)? {
                        event!(
                            Level::DEBUG,
                            content_id,
                            entity_type = %mapping.entity_type_name,
                            "temporary key reassigned"
                        );
                        result.key_mappings.push(mapping);
                    }
                    result.entities.push(SavedEntity::Returned(entity.clone()));
                }
                None => {
                    let original = tables.original(content_id).ok_or_else(|| {
                        AdapterError::BatchFault(format!("no entity recorded for content id {}", content_id))
                    })?;
                    result.entities.push(SavedEntity::Original(original.clone()));
                }
            }
        }

        event!(
            Level::DEBUG,
            entities = result.entities.len(),
            key_mappings = result.key_mappings.len(),
            "batch response correlated"
        );
        Ok(result)
    }

    fn fail_on_first_fault(&self, groups: &[ResponseGroup]) -> Result<()> {
        let failed = groups
            .iter()
            .flat_map(|group| group.responses.iter())
            .enumerate()
            .find(|(_, change)| change.is_failure());
        match failed {
            Some((position, change)) => Err(self.fault(position, change)),
            None => Ok(()),
        }
    }

    fn fault(&self, position: usize, change: &ChangeResponse) -> AdapterError {
        let fault = self.normalizer.normalize(change.into(), self.url);
        event!(
            Level::WARN,
            position,
            status = ?fault.status,
            message = %fault.message,
            "change operation failed; batch rejected"
        );
        AdapterError::ServerFault(fault)
    }
}

/// Key reassignment for a created entity whose type generates keys server-side.
fn key_mapping(tables: &CorrelationTables, content_id: usize, entity: &JsonValue) -> Result<Option<KeyMapping>> {
    let Some(temp) = tables.temp_key(content_id) else {
        return Ok(None);
    };
    if temp.auto_generated_key == AutoGeneratedKeyType::None {
        return Ok(None);
    }
    let Some(key_name) = &temp.key_name_on_server else {
        return Ok(None);
    };

    let real_value = entity.get(key_name).cloned().ok_or_else(|| {
        AdapterError::BatchFault(format!(
            "created '{}' came back without key property '{}'",
            temp.entity_type_name, key_name
        ))
    })?;

    Ok(Some(KeyMapping {
        entity_type_name: temp.entity_type_name.clone(),
        temp_value: temp.temp_value.clone(),
        real_value,
    }))
}
