#![allow(dead_code)]

use async_trait::async_trait;
use odata4_bridge::core::Headers;
use odata4_bridge::{HttpRequest, HttpResponse, Transport, TransportFailure};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Reply = Result<HttpResponse, TransportFailure>;

/// Replays canned replies in order and records every request it was sent.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::new("no scripted reply left")))
    }
}

pub fn json_response(status: u16, status_text: &str, body: &JsonValue) -> Reply {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    Ok(HttpResponse {
        status,
        status_text: status_text.to_string(),
        headers,
        body: Some(body.to_string()),
    })
}

/// One embedded HTTP response of a change group.
pub struct Part {
    pub status_line: &'static str,
    pub body: Option<JsonValue>,
}

pub fn part(status_line: &'static str, body: Option<JsonValue>) -> Part {
    Part { status_line, body }
}

/// A `$batch` reply holding one change group.
pub fn batch_response(parts: &[Part]) -> Reply {
    let mut lines = vec![
        "--batchresponse_t".to_string(),
        "Content-Type: multipart/mixed; boundary=changesetresponse_t".to_string(),
        String::new(),
    ];
    for (index, part) in parts.iter().enumerate() {
        lines.push("--changesetresponse_t".to_string());
        lines.push("Content-Type: application/http".to_string());
        lines.push("Content-Transfer-Encoding: binary".to_string());
        // Echoed ids never match the sent ones.
        lines.push(format!("Content-ID: {}", 100 + index));
        lines.push(String::new());
        lines.push(part.status_line.to_string());
        match &part.body {
            Some(body) => {
                lines.push("Content-Type: application/json; odata.metadata=minimal".to_string());
                lines.push(String::new());
                lines.push(body.to_string());
            }
            None => lines.push(String::new()),
        }
    }
    lines.push("--changesetresponse_t--".to_string());
    lines.push("--batchresponse_t--".to_string());
    lines.push(String::new());

    let mut headers = Headers::new();
    headers.insert(
        "Content-Type".to_string(),
        "multipart/mixed; boundary=batchresponse_t".to_string(),
    );
    Ok(HttpResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers,
        body: Some(lines.join("\r\n")),
    })
}
