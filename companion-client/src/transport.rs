//! Transport client
//!
//! Wraps an [`HttpBackend`] with the session concerns every remote call shares:
//! - attaches `Authorization: Bearer <token>` when a credential is held
//! - decodes 2xx bodies as JSON or text depending on the declared content type
//! - turns 401/403 into [`ClientError::Auth`] after raising the session signal,
//!   except on anonymous requests (login, register) where they are plain failures
//! - turns any other non-2xx into [`ClientError::Request`] carrying the body
//!
//! Each call is a single attempt. Retry policy belongs to the caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{HttpBackend, HttpRequest, HttpResponse, Method};
use crate::error::{ClientError, Result};
use crate::signal::SignalEmitter;
use crate::types::Credential;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn from_success(response: HttpResponse) -> Result<Self> {
        if response.is_json() && !response.body.trim().is_empty() {
            Ok(ResponseBody::Json(serde_json::from_str(&response.body)?))
        } else {
            Ok(ResponseBody::Text(response.body))
        }
    }

    // Error bodies are only used for messages, so a malformed one stays text.
    fn from_failure(response: HttpResponse) -> Self {
        if response.is_json() {
            if let Ok(value) = serde_json::from_str(&response.body) {
                return ResponseBody::Json(value);
            }
        }
        ResponseBody::Text(response.body)
    }

    /// The server's `message` field, when the body is a JSON object carrying one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(value) => value.get("message").and_then(Value::as_str),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Json(value) => value.is_null(),
            ResponseBody::Text(text) => text.is_empty(),
        }
    }

    /// Deserialize into `T`. An empty body decodes as JSON `null`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value)?),
            ResponseBody::Text(text) if text.is_empty() => Ok(serde_json::from_value(Value::Null)?),
            ResponseBody::Text(text) => Err(ClientError::Decode(format!(
                "expected a JSON body, got text: {}",
                truncate(&text, 80)
            ))),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// Whether a request speaks for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Session,
    Anonymous,
}

/// Supplies the credential to attach to each request.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<Credential>;
}

/// Fixed credential, for tooling and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<Credential>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(Credential::new(token)))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<Credential> {
        self.0.clone()
    }
}

/// Credential-attaching, failure-classifying request client.
///
/// Cheap to clone; clones share the backend, credential source and signal.
#[derive(Clone)]
pub struct TransportClient {
    backend: Arc<dyn HttpBackend>,
    credentials: Arc<dyn CredentialSource>,
    signal: SignalEmitter,
}

impl TransportClient {
    /// Create a transport. `signal` is raised on every 401/403.
    pub fn new(
        backend: Arc<dyn HttpBackend>,
        credentials: Arc<dyn CredentialSource>,
        signal: SignalEmitter,
    ) -> Self {
        Self {
            backend,
            credentials,
            signal,
        }
    }

    pub fn base_url(&self) -> &str {
        self.backend.base_url()
    }

    /// Issue one request and classify the response.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<ResponseBody> {
        self.dispatch(method, path, body, Scope::Session).await
    }

    /// Issue one request outside the session. No credential is attached and
    /// a 401/403 is an ordinary [`ClientError::Request`]; the signal stays
    /// quiet. Login and registration go through here.
    pub async fn request_anonymous(&self, method: Method, path: &str, body: Option<Value>) -> Result<ResponseBody> {
        self.dispatch(method, path, body, Scope::Anonymous).await
    }

    async fn dispatch(&self, method: Method, path: &str, body: Option<Value>, scope: Scope) -> Result<ResponseBody> {
        let mut request = HttpRequest::new(method, path);
        let credential = match scope {
            Scope::Session => self.credentials.credential(),
            Scope::Anonymous => None,
        };
        let authenticated = match credential {
            Some(credential) => {
                request = request.with_authorization(credential.bearer());
                true
            }
            None => false,
        };
        if let Some(body) = body {
            request = request.with_body(body);
        }

        debug!(%method, path, authenticated, "Sending request");

        let response = self.backend.send(request).await.map_err(|e| {
            warn!(%method, path, error = %e, "No response received");
            ClientError::Network(e)
        })?;

        self.classify(method, path, response, scope)
    }

    fn classify(&self, method: Method, path: &str, response: HttpResponse, scope: Scope) -> Result<ResponseBody> {
        match response.status {
            401 | 403 if scope == Scope::Session => {
                warn!(%method, path, status = response.status, "Credential rejected, raising session signal");
                self.signal.raise();
                Err(ClientError::Auth {
                    status: response.status,
                })
            }
            status if response.is_success() => {
                debug!(%method, path, status, "Request succeeded");
                ResponseBody::from_success(response)
            }
            status => {
                let body = ResponseBody::from_failure(response);
                warn!(%method, path, status, server_message = body.message().unwrap_or(""), "Request failed");
                Err(ClientError::Request { status, body })
            }
        }
    }

    /// Issue a request with a serializable body.
    pub async fn request_with<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ResponseBody> {
        let body = serde_json::to_value(body)?;
        self.request(method, path, Some(body)).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::Get, path, None).await?.decode()
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.request_with(Method::Post, path, body).await?.decode()
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.request_with(Method::Put, path, body).await?.decode()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::Delete, path, None).await.map(|_| ())
    }

    /// [`post`](Self::post) without the session. See [`request_anonymous`](Self::request_anonymous).
    pub async fn post_anonymous<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request_anonymous(Method::Post, path, Some(body)).await?.decode()
    }
}
