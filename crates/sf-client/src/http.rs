//! reqwest-backed HttpClient
//!
//! Attaches the bearer token, applies connect/request timeouts and maps
//! non-2xx responses to `ClientError::Server` with the server's `message`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{ClientError, HttpClient, Result};

/// Admin API connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Admin API base URL
    pub base_url: String,
    /// Optional Bearer token for authentication
    pub token: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub struct ReqwestHttpClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Sending admin API request");

        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Admin API request failed");
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        warn!(status = status.as_u16(), message = %message, "Admin API returned an error");

        Err(ClientError::Server { status: status.as_u16(), message })
    }

    async fn json_body(&self, response: Response) -> Result<Value> {
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Pick the human-readable part of an error body: `message`, then `error`,
/// then the raw text.
fn error_message(body: &str) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                if !s.is_empty() {
                    return Some(s.clone());
                }
            }
        }
    }

    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        self.json_body(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        self.json_body(response).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.send(self.request(Method::PATCH, path).json(body)).await?;
        self.json_body(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}
