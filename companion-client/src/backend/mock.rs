//! Mock HTTP backend for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::traits::*;

/// A scripted reply for one request.
#[derive(Debug, Clone)]
pub struct MockReply {
    status: u16,
    content_type: Option<String>,
    body: String,
    failure: Option<String>,
    gate: Option<Arc<Notify>>,
}

impl MockReply {
    /// Reply with a JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
            failure: None,
            gate: None,
        }
    }

    /// Reply with a plain-text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
            failure: None,
            gate: None,
        }
    }

    /// Reply with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: String::new(),
            failure: None,
            gate: None,
        }
    }

    /// Fail without a response, as if the server were unreachable.
    pub fn network_error(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::empty(0)
        }
    }

    /// Override the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Hold the reply until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Mock backend for testing.
///
/// Replies are scripted per `(method, path)` and consumed in FIFO order.
/// Every request is recorded.
pub struct MockBackend {
    base_url: String,
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            base_url: "http://mock.invalid".to_string(),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script the next reply for `method path`.
    pub fn enqueue(&self, method: Method, path: impl Into<String>, reply: MockReply) {
        lock(&self.routes)
            .entry((method, path.into()))
            .or_default()
            .push_back(reply);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Requests received for one route.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of scripted replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        lock(&self.routes).values().map(VecDeque::len).sum()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl HttpBackend for MockBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        let key = (request.method, request.path.clone());
        lock(&self.requests).push(request);

        let reply = lock(&self.routes).get_mut(&key).and_then(VecDeque::pop_front);

        let Some(reply) = reply else {
            return Ok(HttpResponse {
                status: 404,
                content_type: Some("application/json".to_string()),
                body: serde_json::json!({
                    "message": format!("No mock reply for {} {}", key.0, key.1)
                })
                .to_string(),
            });
        };

        if let Some(gate) = &reply.gate {
            gate.notified().await;
        }

        if let Some(reason) = reply.failure {
            return Err(BackendError::Connection(reason));
        }

        Ok(HttpResponse {
            status: reply.status,
            content_type: reply.content_type,
            body: reply.body,
        })
    }
}
