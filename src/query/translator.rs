use crate::core::{AdapterError, Result};
use crate::transport::HttpResponse;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

/// Older dialect token requesting the total row count.
pub const INLINE_COUNT_ALL_PAGES: &str = "$inlinecount=allpages";
/// Older dialect token suppressing the total row count.
pub const INLINE_COUNT_NONE: &str = "$inlinecount=none";
pub const COUNT_TRUE: &str = "$count=true";
pub const COUNT_FALSE: &str = "$count=false";

const VALUE_FIELD: &str = "value";
const COUNT_FIELD: &str = "@odata.count";

/// Rows of one query plus the total count when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub results: Vec<JsonValue>,
    /// `None` when no count was returned, which is not the same as zero.
    pub inline_count: Option<i64>,
    pub http_response: Option<HttpResponse>,
}

/// Rewrite the first inline-count token of each kind; nothing else changes.
pub fn translate_query_url(url: &str) -> String {
    url.replacen(INLINE_COUNT_ALL_PAGES, COUNT_TRUE, 1)
        .replacen(INLINE_COUNT_NONE, COUNT_FALSE, 1)
}

/// Extract `{results, inlineCount}` from a result envelope.
pub fn normalize_query_response(body: &JsonValue) -> Result<QueryResult> {
    let results = body
        .get(VALUE_FIELD)
        .and_then(JsonValue::as_array)
        .cloned()
        .ok_or_else(|| AdapterError::Decode(format!("Query response lacks a '{}' array", VALUE_FIELD)))?;

    let inline_count = match body.get(COUNT_FIELD) {
        None | Some(JsonValue::Null) => None,
        Some(raw) => {
            let parsed = parse_count(raw);
            if parsed.is_none() {
                event!(Level::WARN, count = %raw, "unparseable inline count ignored");
            }
            parsed
        }
    };

    Ok(QueryResult {
        results,
        inline_count,
        http_response: None,
    })
}

/// The count may arrive as a number or as a numeric string.
fn parse_count(raw: &JsonValue) -> Option<i64> {
    match raw {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        JsonValue::String(text) => parse_leading_integer(text),
        _ => None,
    }
}

/// Leading optional sign plus digits; trailing garbage is ignored.
fn parse_leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let digits_start = usize::from(text.starts_with(['-', '+']));
    let digits_len = text[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    text[..digits_start + digits_len].parse().ok()
}
