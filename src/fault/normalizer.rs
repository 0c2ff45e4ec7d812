use super::{ConnectivityClassifier, StatusZeroClassifier};
use crate::batch::ChangeResponse;
use crate::transport::{HttpResponse, TransportFailure};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// Nested error fields, searched in this order at every level.
const NESTED_ERROR_FIELDS: [&str; 3] = ["error", "innererror", "internalexception"];

/// Envelope used by the older dialect around the whole error object.
const LEGACY_ERROR_ENVELOPE: &str = "odata.error";

/// Separator placed between messages of successive error levels.
const MESSAGE_SEPARATOR: &str = "; ";

/// A failure as handed over by the transport or the batch decoder.
#[derive(Debug, Clone, Copy)]
pub enum RawFailure<'a> {
    /// No HTTP semantics at all; the text is all we know.
    Bare(&'a str),
    Response {
        status: Option<u16>,
        status_text: &'a str,
        body: Option<&'a str>,
    },
}

impl<'a> From<&'a TransportFailure> for RawFailure<'a> {
    fn from(failure: &'a TransportFailure) -> Self {
        RawFailure::Bare(failure.message())
    }
}

impl<'a> From<&'a HttpResponse> for RawFailure<'a> {
    fn from(response: &'a HttpResponse) -> Self {
        RawFailure::Response {
            status: Some(response.status),
            status_text: &response.status_text,
            body: response.body.as_deref(),
        }
    }
}

impl<'a> From<&'a ChangeResponse> for RawFailure<'a> {
    fn from(response: &'a ChangeResponse) -> Self {
        RawFailure::Response {
            status: response.status_code,
            status_text: &response.status_text,
            body: response.body.as_deref(),
        }
    }
}

/// Error body as received: parsed when it was JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultBody {
    Text(String),
    Json(JsonValue),
}

/// One flattened failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerFault {
    pub message: String,
    pub status_text: String,
    /// `None` when the failure never produced an HTTP response.
    pub status: Option<u16>,
    pub body: Option<FaultBody>,
    pub url: Option<String>,
    /// Set by the connectivity classifier.
    pub no_connection: bool,
}

impl fmt::Display for ServerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServerFault {}

/// Flattens transport and server failures into [`ServerFault`]s.
#[derive(Clone)]
pub struct FaultNormalizer {
    classifier: Arc<dyn ConnectivityClassifier>,
}

impl Default for FaultNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FaultNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultNormalizer").finish_non_exhaustive()
    }
}

impl FaultNormalizer {
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(StatusZeroClassifier),
        }
    }

    pub fn with_classifier(classifier: Arc<dyn ConnectivityClassifier>) -> Self {
        Self { classifier }
    }

    /// Normalize a failure into one message plus status metadata.
    ///
    /// Body parsing problems are swallowed: the status text stays the message.
    pub fn normalize(&self, raw: RawFailure<'_>, url: Option<&str>) -> ServerFault {
        let mut fault = match raw {
            RawFailure::Bare(text) => ServerFault {
                message: text.to_string(),
                status_text: text.to_string(),
                ..ServerFault::default()
            },
            RawFailure::Response {
                status,
                status_text,
                body,
            } => {
                let mut fault = ServerFault {
                    message: status_text.to_string(),
                    status_text: status_text.to_string(),
                    status,
                    body: body.map(|text| FaultBody::Text(text.to_string())),
                    ..ServerFault::default()
                };
                if let Some(parsed) = body.and_then(|text| serde_json::from_str::<JsonValue>(text).ok()) {
                    let message = flatten_error_chain(&parsed);
                    if !message.is_empty() {
                        fault.message = message;
                    }
                    fault.body = Some(FaultBody::Json(parsed));
                }
                fault
            }
        };

        fault.url = url.map(str::to_string);
        self.classifier.classify(&mut fault);

        event!(
            Level::DEBUG,
            status = ?fault.status,
            no_connection = fault.no_connection,
            message = %fault.message,
            "failure normalized"
        );
        fault
    }
}

/// Walk the nested error chain outer-to-inner, concatenating every level's message.
fn flatten_error_chain(body: &JsonValue) -> String {
    let mut level = body.get(LEGACY_ERROR_ENVELOPE).unwrap_or(body);
    let mut messages = Vec::new();

    loop {
        if let Some(message) = level_message(level) {
            messages.push(message);
        }
        let next = NESTED_ERROR_FIELDS
            .iter()
            .find_map(|field| level.get(*field).filter(|nested| nested.is_object()));
        match next {
            Some(nested) => level = nested,
            None => break,
        }
    }

    messages.join(MESSAGE_SEPARATOR)
}

/// `message`, else `Message`; either may be a plain string or `{ "value": string }`.
fn level_message(level: &JsonValue) -> Option<&str> {
    let raw = level.get("message").or_else(|| level.get("Message"))?;
    let text = match raw {
        JsonValue::String(text) => text.as_str(),
        JsonValue::Object(map) => map.get("value")?.as_str()?,
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
