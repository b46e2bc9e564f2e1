//! Admin API Client
//!
//! This crate provides the HTTP boundary of the admin data layer:
//! - HttpClient: the async trait list synchronizers and mutation dispatchers call
//! - ReqwestHttpClient: reqwest implementation with bearer auth and timeouts
//! - ListResponse / ItemResponse: response shapes decoded once at the boundary

pub mod http;
pub mod response;

use async_trait::async_trait;
use serde_json::Value;
use sf_common::{EntityId, SyncError};
use thiserror::Error;

pub use http::{ApiConfig, ReqwestHttpClient};
pub use response::{ItemResponse, ListResponse};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// 2xx response whose body did not have the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(message) => SyncError::network(message),
            ClientError::Config(message) => SyncError::network(message),
            ClientError::Server { status, message } => SyncError::server(status, message),
            ClientError::Decode(message) => {
                SyncError::server(200, format!("Unexpected response from server: {}", message))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Transport used by the list/mutation layer. Paths are relative to the
/// client's base URL.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    async fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    /// Success carries no body
    async fn delete(&self, path: &str) -> Result<()>;
}

/// `endpoint/id`, joined with exactly one slash
pub fn resource_path(endpoint: &str, id: &EntityId) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), id)
}
