//! `multipart/mixed` framing of `$batch` requests and responses.

use super::{CONTENT_ID_HEADER, CONTENT_TYPE_HEADER, BatchResponse, ChangeRequest, ChangeResponse, ResponseGroup};
use crate::core::{AdapterError, Headers, Result, find_header};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

const CRLF: &str = "\r\n";
const MULTIPART_MIXED: &str = "multipart/mixed";
const APPLICATION_HTTP: &str = "application/http";

lazy_static! {
    static ref STATUS_LINE: Regex = Regex::new(r"^HTTP/\d\.\d\s+(\d{3})\s*(.*)$").unwrap();
}

/// A batch request body together with the `Content-Type` it must be sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub content_type: String,
    pub body: String,
}

/// Encode `requests` as one change group inside one batch, with fresh boundaries.
pub fn encode(requests: &[ChangeRequest]) -> Result<EncodedBatch> {
    let batch_boundary = format!("batch_{}", Uuid::new_v4());
    let changeset_boundary = format!("changeset_{}", Uuid::new_v4());
    encode_with_boundaries(requests, &batch_boundary, &changeset_boundary)
}

pub fn encode_with_boundaries(
    requests: &[ChangeRequest],
    batch_boundary: &str,
    changeset_boundary: &str,
) -> Result<EncodedBatch> {
    let mut body = String::new();
    push_line(&mut body, &format!("--{}", batch_boundary));
    push_line(
        &mut body,
        &format!("{}: {}; boundary={}", CONTENT_TYPE_HEADER, MULTIPART_MIXED, changeset_boundary),
    );
    push_line(&mut body, "");

    for request in requests {
        push_line(&mut body, &format!("--{}", changeset_boundary));
        push_line(&mut body, &format!("{}: {}", CONTENT_TYPE_HEADER, APPLICATION_HTTP));
        push_line(&mut body, "Content-Transfer-Encoding: binary");
        push_line(&mut body, &format!("{}: {}", CONTENT_ID_HEADER, request.content_id));
        push_line(&mut body, "");

        push_line(&mut body, &format!("{} {} HTTP/1.1", request.method, request.request_uri));
        for (name, value) in &request.headers {
            push_line(&mut body, &format!("{}: {}", name, value));
        }
        push_line(&mut body, "");
        if let Some(payload) = &request.body {
            push_line(&mut body, &serde_json::to_string(payload)?);
        }
    }

    push_line(&mut body, &format!("--{}--", changeset_boundary));
    push_line(&mut body, "");
    push_line(&mut body, &format!("--{}--", batch_boundary));

    Ok(EncodedBatch {
        content_type: format!("{}; boundary={}", MULTIPART_MIXED, batch_boundary),
        body,
    })
}

fn push_line(body: &mut String, line: &str) {
    body.push_str(line);
    body.push_str(CRLF);
}

/// Decode a `$batch` response body.
///
/// Every nested change group becomes one [`ResponseGroup`]. A bare
/// `application/http` part at the top level, which servers send when a whole
/// change group was rejected, becomes a group holding that single response.
pub fn decode(content_type: &str, body: &str) -> Result<BatchResponse> {
    let boundary = boundary_of(content_type)?;
    let body = body.replace(CRLF, "\n");

    let mut groups = Vec::new();
    for part in split_parts(&body, &boundary)? {
        let (headers, content) = split_head(part);
        let part_type = find_header(&headers, CONTENT_TYPE_HEADER).unwrap_or_default();

        if is_media_type(part_type, MULTIPART_MIXED) {
            let nested = boundary_of(part_type)?;
            let responses = split_parts(content, &nested)?
                .into_iter()
                .map(|change| parse_http_response(split_head(change).1))
                .collect::<Result<Vec<_>>>()?;
            groups.push(ResponseGroup { responses });
        } else if is_media_type(part_type, APPLICATION_HTTP) {
            groups.push(ResponseGroup {
                responses: vec![parse_http_response(content)?],
            });
        } else {
            return Err(AdapterError::Decode(format!(
                "unexpected batch part content type '{}'",
                part_type
            )));
        }
    }

    Ok(BatchResponse { groups })
}

fn is_media_type(content_type: &str, expected: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(expected))
}

/// `boundary` parameter of a multipart content type, unquoted.
fn boundary_of(content_type: &str) -> Result<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| AdapterError::Decode(format!("no multipart boundary in '{}'", content_type)))
}

/// Parts between the first delimiter and the closing delimiter.
fn split_parts<'b>(body: &'b str, boundary: &str) -> Result<Vec<&'b str>> {
    let delimiter = format!("--{}", boundary);
    let mut sections = body.split(delimiter.as_str());
    if sections.next().is_none() {
        return Err(AdapterError::Decode("empty multipart body".to_string()));
    }

    let mut parts = Vec::new();
    for section in sections {
        if section.starts_with("--") {
            return Ok(parts);
        }
        let part = section.strip_prefix('\n').unwrap_or(section);
        parts.push(part.strip_suffix('\n').unwrap_or(part));
    }

    Err(AdapterError::Decode(format!(
        "multipart body is missing its closing '--{}--' delimiter",
        boundary
    )))
}

/// Header block and content of one part; a part without a blank line is all headers.
fn split_head(part: &str) -> (Headers, &str) {
    let (head, content) = part.split_once("\n\n").unwrap_or((part, ""));
    let headers = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    (headers, content)
}

fn parse_http_response(text: &str) -> Result<ChangeResponse> {
    let text = text.trim_start_matches('\n');
    let (status_line, rest) = text.split_once('\n').unwrap_or((text, ""));
    let captures = STATUS_LINE
        .captures(status_line.trim_end())
        .ok_or_else(|| AdapterError::Decode(format!("malformed status line '{}'", status_line)))?;

    let status_code = captures[1].parse::<u16>().ok();
    let status_text = captures
        .get(2)
        .map(|text| text.as_str().trim().to_string())
        .unwrap_or_default();

    let (headers, content) = split_head(rest);
    let content = content.trim_end();
    let body = (!content.is_empty()).then(|| content.to_string());
    let data = body
        .as_deref()
        .and_then(|text| serde_json::from_str::<JsonValue>(text).ok());

    Ok(ChangeResponse {
        status_code,
        status_text,
        headers,
        body,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn create_order() -> ChangeRequest {
        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), "application/json;IEEE754Compatible=true".to_string());
        ChangeRequest {
            content_id: 1,
            method: Method::POST,
            request_uri: "odata/Orders".to_string(),
            headers,
            body: json!({ "Id": -1 }).as_object().cloned(),
        }
    }

    #[test]
    fn encodes_one_change_group_with_content_ids() {
        let delete = ChangeRequest {
            content_id: 2,
            method: Method::DELETE,
            request_uri: "odata/Orders(4)".to_string(),
            headers: Headers::new(),
            body: None,
        };
        let encoded = encode_with_boundaries(&[create_order(), delete], "batch_a", "changeset_b").unwrap();

        assert_eq!(encoded.content_type, "multipart/mixed; boundary=batch_a");
        let expected = [
            "--batch_a",
            "Content-Type: multipart/mixed; boundary=changeset_b",
            "",
            "--changeset_b",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "Content-ID: 1",
            "",
            "POST odata/Orders HTTP/1.1",
            "Content-Type: application/json;IEEE754Compatible=true",
            "",
            "{\"Id\":-1}",
            "--changeset_b",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "Content-ID: 2",
            "",
            "DELETE odata/Orders(4) HTTP/1.1",
            "",
            "--changeset_b--",
            "",
            "--batch_a--",
            "",
        ]
        .join("\r\n");
        assert_eq!(encoded.body, expected);
    }

    #[test]
    fn generated_boundaries_are_unique() {
        let first = encode(&[create_order()]).unwrap();
        let second = encode(&[create_order()]).unwrap();
        assert!(first.content_type.contains("boundary=batch_"));
        assert_ne!(first.content_type, second.content_type);
    }

    #[test]
    fn decodes_nested_change_group() {
        let body = [
            "--batchresponse_1",
            "Content-Type: multipart/mixed; boundary=changesetresponse_2",
            "",
            "--changesetresponse_2",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "Content-ID: 1",
            "",
            "HTTP/1.1 201 Created",
            "Content-Type: application/json; odata.metadata=minimal",
            "",
            "{\"Id\":42}",
            "--changesetresponse_2",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "",
            "HTTP/1.1 204 No Content",
            "",
            "",
            "--changesetresponse_2--",
            "--batchresponse_1--",
            "",
        ]
        .join("\r\n");

        let response = decode("multipart/mixed; boundary=\"batchresponse_1\"", &body).unwrap();
        assert_eq!(response.groups.len(), 1);
        let responses = &response.groups[0].responses;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status_code, Some(201));
        assert_eq!(responses[0].status_text, "Created");
        assert_eq!(responses[0].data, Some(json!({ "Id": 42 })));
        assert_eq!(
            responses[0].header("content-type"),
            Some("application/json; odata.metadata=minimal")
        );
        assert_eq!(responses[1].status_code, Some(204));
        assert_eq!(responses[1].body, None);
    }

    #[test]
    fn top_level_failure_becomes_single_response_group() {
        let body = [
            "--batchresponse_9",
            "Content-Type: application/http",
            "Content-Transfer-Encoding: binary",
            "",
            "HTTP/1.1 400 Bad Request",
            "Content-Type: application/json",
            "",
            "{\"error\":{\"message\":\"Invalid key\"}}",
            "--batchresponse_9--",
        ]
        .join("\r\n");

        let response = decode("multipart/mixed; boundary=batchresponse_9", &body).unwrap();
        assert_eq!(response.groups.len(), 1);
        let failed = &response.groups[0].responses[0];
        assert_eq!(failed.status_code, Some(400));
        assert!(failed.is_failure());
        assert_eq!(failed.body.as_deref(), Some("{\"error\":{\"message\":\"Invalid key\"}}"));
    }

    #[test]
    fn malformed_input_is_a_decode_error() {
        assert!(matches!(decode("application/json", "{}"), Err(AdapterError::Decode(_))));

        let unterminated = "--b\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 200 OK\r\n";
        assert!(matches!(
            decode("multipart/mixed; boundary=b", unterminated),
            Err(AdapterError::Decode(_))
        ));

        let bad_status = "--b\r\nContent-Type: application/http\r\n\r\nnot http\r\n--b--";
        assert!(matches!(
            decode("multipart/mixed; boundary=b", bad_status),
            Err(AdapterError::Decode(_))
        ));
    }
}
