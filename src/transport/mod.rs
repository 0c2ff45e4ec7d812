//! Transport seam
//!
//! The adapter never opens a connection itself. Every round-trip goes through
//! a [`Transport`], which takes a request descriptor and returns the raw
//! response. An HTTP error status is still a response; only failures that
//! produced no response at all surface as [`TransportFailure`].

mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use crate::core::{Headers, find_header};
use async_trait::async_trait;
use http::Method;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(uri: impl Into<String>, headers: Headers) -> Self {
        Self {
            method: Method::GET,
            uri: uri.into(),
            headers,
            body: None,
        }
    }

    pub fn post(uri: impl Into<String>, headers: Headers, body: String) -> Self {
        Self {
            method: Method::POST,
            uri: uri.into(),
            headers,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (100..400).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A failure that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFailure {
    message: String,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}
