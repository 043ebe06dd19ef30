//! HTTP client abstraction for talking to hosted services.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use crate::error::{Result, RowflowError};
use async_trait::async_trait;
use std::time::Duration;

/// An outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (e.g., "POST", "GET")
    pub method: String,
    /// Scheme, host and port (e.g., <https://bigquery.googleapis.com>)
    pub endpoint: String,
    /// Path and query portion of the URL (e.g., "/bigquery/v2/projects/p/...")
    pub path: String,
    /// Request body as a JSON string; empty for no body
    pub body: String,
}

impl HttpRequest {
    pub fn new(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            path: path.into(),
            body: body.into(),
        }
    }

    /// Build a request from an absolute URL, splitting it into endpoint and path.
    pub fn from_url(method: &str, url: &str, body: impl Into<String>) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RowflowError::Config(format!("invalid URL '{}': {}", url, e)))?;

        let endpoint = parsed.origin().ascii_serialization();
        if endpoint == "null" {
            return Err(RowflowError::Config(format!(
                "URL '{}' has no usable origin",
                url
            )));
        }

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self::new(method, endpoint, path, body))
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint, self.path)
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and keeps the destination and generator adapters testable without real HTTP calls.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.execute(&request, "access-token", 5000).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request.
    ///
    /// # Arguments
    /// * `request` - The request data containing endpoint, method, path, and body
    /// * `bearer_token` - Token for the Authorization: Bearer header; empty for none
    /// * `timeout_ms` - Request timeout in milliseconds
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request fails due to network issues
    /// - The request times out
    /// - The URL is invalid
    ///
    /// Non-2xx statuses are not errors at this layer.
    async fn execute(
        &self,
        request: &HttpRequest,
        bearer_token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured reqwest client (proxies, custom TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request, bearer_token), fields(method = %request.method, endpoint = %request.endpoint))]
    async fn execute(
        &self,
        request: &HttpRequest,
        bearer_token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let url = request.url();

        tracing::debug!(
            url = %url,
            timeout_ms = timeout_ms,
            "Executing HTTP request"
        );

        let method: reqwest::Method = request.method.parse().map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            anyhow::anyhow!("Invalid HTTP method '{}': {}", request.method, e)
        })?;

        let mut req = self
            .client
            .request(method, &url)
            .timeout(Duration::from_millis(timeout_ms));

        if !bearer_token.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", bearer_token));
        }

        if !request.body.is_empty() {
            req = req
                .header("Content-Type", "application/json")
                .body(request.body.clone());
            tracing::trace!(body_len = request.body.len(), "Added request body");
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific requests without
/// making actual HTTP calls.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "POST /bigquery/v2/projects/p/datasets/d/tables/t/insertAll",
///     Ok(HttpResponse {
///         status: 200,
///         body: r#"{"kind":"bigquery#tableDataInsertAllResponse"}"#.to_string(),
///     }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<HttpResponse>>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: String,
    pub endpoint: String,
    pub path: String,
    pub body: String,
    pub bearer_token: String,
    pub timeout_ms: u64,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a specific method and path.
    ///
    /// The key is formatted as "{method} {path}". Multiple responses can be
    /// added for the same key - they will be returned in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(
        &self,
        request: &HttpRequest,
        bearer_token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        self.calls.lock().push(MockCall {
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            path: request.path.clone(),
            body: request.body.clone(),
            bearer_token: bearer_token.to_string(),
            timeout_ms,
        });

        let key = format!("{} {}", request.method, request.path);
        let response = self
            .responses
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        response.unwrap_or_else(|| {
            Err(RowflowError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                key
            )))
        })
    }
}
