//! Core traits for HTTP backends.
//!
//! This module defines the `HttpBackend` trait - a single-attempt request
//! executor with no knowledge of sessions or status semantics.

use std::fmt;

use async_trait::async_trait;

/// Error types for backend operations.
///
/// All of these mean no usable response was received.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Could not reach the server
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Response started but its body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the backend's base URL
    pub path: String,
    /// Full `Authorization` header value, if any
    pub authorization: Option<String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            authorization: None,
            body: None,
        }
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A raw response. Status interpretation is left to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the response declares a JSON content type.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }
}

/// Core trait for HTTP backends.
///
/// Implementations perform exactly one attempt per call: no retry,
/// no timeout policy, no deduplication.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Base URL requests are resolved against.
    fn base_url(&self) -> &str;

    /// Execute a request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError>;
}
