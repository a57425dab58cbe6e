//! HTTP client for the node's REST API.
//!
//! Every call carries the cached token in the `Authorization` header when
//! one exists. Non-success statuses are returned, not raised, so callers
//! decide what counts as a rejection.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use shock_shared::constants::UNKNOWN_ERROR_MESSAGE;
use shock_store::{Cache, StoreError};

use crate::error::{RemoteOperationError, Result};

/// Status and decoded body of a completed call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body, a JSON string for non-JSON bodies, `Null` when empty.
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's explanation of a failure, if it sent one.
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("errorMessage")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// Turn this response into a rejection carrying the server message, or
    /// `fallback` when there is none.
    pub fn rejection(&self, fallback: &str) -> RemoteOperationError {
        RemoteOperationError::Rejected {
            status: self.status,
            message: self.error_message().unwrap_or(fallback).to_string(),
        }
    }

    /// Fail unless the status is 2xx.
    pub fn ensure_success(self) -> std::result::Result<Self, RemoteOperationError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.rejection(UNKNOWN_ERROR_MESSAGE))
        }
    }

    /// Fail unless the status is exactly 200.
    pub fn ensure_ok(self) -> std::result::Result<Self, RemoteOperationError> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(self.rejection(UNKNOWN_ERROR_MESSAGE))
        }
    }

    pub fn json<T: DeserializeOwned>(self) -> std::result::Result<T, RemoteOperationError> {
        serde_json::from_value(self.body)
            .map_err(|e| RemoteOperationError::InvalidResponse(e.to_string()))
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<Cache>,
    default_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        cache: Arc<Cache>,
        default_timeout: Duration,
    ) -> std::result::Result<Self, RemoteOperationError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteOperationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
            default_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue a call. `timeout` overrides the default per-call timeout.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let url = self.url(path);

        let mut request = self.http.request(method.clone(), &url).timeout(timeout);

        match self.cache.get_token() {
            Ok(token) => request = request.header(AUTHORIZATION, token),
            Err(StoreError::AuthRequired) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| classify(e, timeout))?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        debug!(%method, path, status, "api call completed");
        Ok(ApiResponse { status, body })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(body), None).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, None, None).await
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> RemoteOperationError {
    if e.is_timeout() {
        RemoteOperationError::Timeout(timeout)
    } else if e.is_decode() {
        RemoteOperationError::InvalidResponse(e.to_string())
    } else {
        RemoteOperationError::Transport(e.to_string())
    }
}
