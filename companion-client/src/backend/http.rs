//! reqwest-backed HTTP backend.

use async_trait::async_trait;
use reqwest::{header, Client};

use super::traits::*;
use crate::config::ClientConfig;

/// Production backend talking to the trip-planning API over HTTP.
pub struct ReqwestBackend {
    client: Client,
    base_url: String,
}

impl ReqwestBackend {
    /// Create a backend for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a backend from client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, BackendError> {
        Self::new(config.base_url.clone())
    }

    /// Use a preconfigured reqwest client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        let url = self.url(&request.path);

        let mut http_request = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };

        if let Some(auth) = &request.authorization {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        if let Some(body) = &request.body {
            http_request = http_request.json(body);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
