//! Request gateway for the Oh! SanSi REST API.
//!
//! Every call goes through [`ApiClient::request`], which attaches the
//! session's bearer token, bounds the whole exchange with a timeout and
//! turns the response into either the parsed JSON body or an [`ApiError`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::Config;

use super::error::DEFAULT_SESSION_EXPIRED_MESSAGE;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Prefix every relative path is mounted under
const API_PREFIX: &str = "/api";

/// Options for a single request. Built with chained setters:
///
/// ```
/// use sansi_core::api::{Method, RequestOptions};
///
/// let options = RequestOptions::new()
///     .method(Method::POST)
///     .json(serde_json::json!({ "gestion": 2025 }));
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    body: Option<Value>,
    headers: HeaderMap,
    token: Option<String>,
    timeout: Option<Duration>,
    without_session: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            token: None,
            timeout: None,
            without_session: false,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// JSON body, serialized as is.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra header. Per-call headers win over everything the gateway adds.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send this token instead of the stored one, skipping the local
    /// expiry check.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Neither check nor send the stored session (sign-in style calls).
    pub fn without_session(mut self) -> Self {
        self.without_session = true;
        self
    }
}

/// API client for the Oh! SanSi backend.
/// Clone is cheap - reqwest::Client and the store are both behind Arcs.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client rooted at `api_root` (e.g. `https://ohsansi.umss.edu`).
    pub fn new(api_root: &str, store: Arc<CredentialStore>) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: format!("{}{}", api_root.trim_end_matches('/'), API_PREFIX),
            store,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn from_config(config: &Config, store: Arc<CredentialStore>) -> Result<Self> {
        Ok(Self::new(&config.api_root, store)?.with_timeout(config.request_timeout()))
    }

    /// Default timeout for requests that do not set their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Absolute URLs pass through untouched; anything else is mounted
    /// under the API root.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Perform one request and return the parsed JSON body.
    ///
    /// `Ok(None)` means the server answered successfully with an empty or
    /// non-JSON body.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Option<Value>, ApiError> {
        let RequestOptions {
            method,
            body,
            headers: extra_headers,
            token,
            timeout,
            without_session,
        } = options;

        if token.is_none() && !without_session && self.store.is_expired(self.store.leeway_secs()) {
            warn!(path = path, "Stored session expired, not sending request");
            self.clear_session();
            return Err(ApiError::SessionExpired(
                DEFAULT_SESSION_EXPIRED_MESSAGE.to_string(),
            ));
        }

        let url = self.resolve_url(path);
        let headers = self.build_headers(token.as_deref(), without_session, extra_headers)?;

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(ref body) = body {
            builder = builder.json(body);
        }
        let request = builder
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let timeout = timeout.unwrap_or(self.timeout);
        debug!(method = %method, url = %url, timeout_ms = timeout.as_millis() as u64, "Sending request");

        let exchange = async {
            let response = self.client.execute(request).await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(timeout, exchange).await {
            Err(_) => {
                warn!(method = %method, url = %url, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                return Err(ApiError::Timeout(timeout));
            }
            Ok(Err(e)) => {
                warn!(method = %method, url = %url, error = %e, "Request failed");
                return Err(ApiError::NetworkUnreachable(e));
            }
            Ok(Ok(answered)) => answered,
        };

        debug!(method = %method, url = %url, status = status.as_u16(), "Response received");
        self.interpret(status, &text)
    }

    /// Like [`request`](Self::request), deserializing the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ApiError> {
        match self.request(path, options).await? {
            Some(body) => serde_json::from_value(body)
                .map(Some)
                .map_err(|e| ApiError::InvalidResponse(format!("Unexpected response from {}: {}", path, e))),
            None => Ok(None),
        }
    }

    // ===== Verb shortcuts =====

    pub async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.request(path, RequestOptions::new()).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Option<Value>, ApiError> {
        self.send_with_body(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Option<Value>, ApiError> {
        self.send_with_body(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<Option<Value>, ApiError> {
        self.send_with_body(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.request(path, RequestOptions::new().method(Method::DELETE)).await
    }

    async fn send_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Body is not serializable: {}", e)))?;
        self.request(path, RequestOptions::new().method(method).json(body)).await
    }

    /// Content type, then the stored session, then the explicit token, then
    /// per-call headers; later entries replace earlier ones.
    fn build_headers(
        &self,
        token: Option<&str>,
        without_session: bool,
        extra: HeaderMap,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !without_session {
            headers.extend(self.store.auth_header());
        }
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::InvalidRequest("Token is not a valid header value".to_string())
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        headers.extend(extra);

        Ok(headers)
    }

    fn interpret(&self, status: StatusCode, text: &str) -> Result<Option<Value>, ApiError> {
        let body = parse_body(text);

        if status == StatusCode::UNAUTHORIZED {
            warn!("Server rejected the session");
            self.clear_session();
            let message = server_message(body.as_ref())
                .unwrap_or_else(|| DEFAULT_SESSION_EXPIRED_MESSAGE.to_string());
            return Err(ApiError::SessionExpired(message));
        }

        let flagged_failure = body
            .as_ref()
            .and_then(|b| b.get("ok"))
            .and_then(Value::as_bool)
            == Some(false);

        if !status.is_success() || flagged_failure {
            let message = server_message(body.as_ref()).unwrap_or_else(|| {
                format!(
                    "Error {} - {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )
            });
            debug!(status = status.as_u16(), body = %ApiError::truncate_body(text), "Request failed");
            return Err(ApiError::ApplicationError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove stored session");
        }
    }
}

/// Parse a body as JSON. Empty, `null` and non-JSON bodies read as absent.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Response body is not JSON");
            None
        }
    }
}

/// The server's own explanation: `message`, else `error`.
fn server_message(body: Option<&Value>) -> Option<String> {
    let body = body?;
    ["message", "error"].iter().find_map(|key| {
        body.get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}
