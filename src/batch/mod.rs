//! Batch change-set protocol
//!
//! A save turns pending entities into one grouped `$batch` request and maps
//! the grouped response back onto those entities. Request building and
//! response correlation are two halves of one round-trip and share the
//! [`CorrelationTables`] produced by the builder.
//!
//! # Architecture
//!
//! - `request.rs` - BatchRequestBuilder and correlation tables
//! - `response.rs` - BatchResponseCorrelator
//! - `wire.rs` - multipart/mixed encoding and decoding
//! - `interceptor.rs` - per-operation rewrite hook

mod interceptor;
mod request;
mod response;
pub mod wire;

pub use interceptor::{ChangeRequestInterceptor, InterceptorFactory, PassThroughInterceptor};
pub use request::{BatchRequestBuilder, BuiltBatch, CorrelationTables, OriginalEntity, TempKeyRecord};
pub use response::{BatchResponse, BatchResponseCorrelator, ChangeResponse, ResponseGroup};

use crate::core::Headers;
use crate::entity::EntityKey;
use http::Method;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

pub const CONTENT_ID_HEADER: &str = "Content-ID";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const IF_MATCH_HEADER: &str = "If-Match";

/// One operation inside the change group.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequest {
    /// Sequential, starting at 1.
    pub content_id: usize,
    pub method: Method,
    pub request_uri: String,
    pub headers: Headers,
    pub body: Option<JsonMap<String, JsonValue>>,
}

/// Temporary-to-real key reassignment for one created entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMapping {
    pub entity_type_name: String,
    pub temp_value: JsonValue,
    pub real_value: JsonValue,
}

/// Entity state after a save slot was processed.
#[derive(Debug, Clone, PartialEq)]
pub enum SavedEntity {
    /// Post-operation state returned by the server.
    Returned(JsonValue),
    /// No body came back (deletes); the original entity stands in.
    Original(OriginalEntity),
}

impl SavedEntity {
    pub fn returned(&self) -> Option<&JsonValue> {
        match self {
            Self::Returned(value) => Some(value),
            Self::Original(_) => None,
        }
    }

    pub fn original_key(&self) -> Option<&EntityKey> {
        match self {
            Self::Returned(_) => None,
            Self::Original(original) => Some(&original.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    pub entities: Vec<SavedEntity>,
    pub key_mappings: Vec<KeyMapping>,
}
