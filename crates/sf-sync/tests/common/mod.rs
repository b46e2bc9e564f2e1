//! Shared fixtures for sf-sync tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_client::{ClientError, HttpClient};
use sf_common::{Entity, EntityId, RecordingNotifier};
use sf_ratelimit::RateLimiterRegistry;
use sf_sync::SyncContext;

/// Admin user record used across tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub role: String,
}

impl Entity for User {
    fn id(&self) -> EntityId {
        EntityId::Number(self.id)
    }
}

pub fn user(id: i64, email: &str) -> User {
    User { id, email: email.to_string(), role: "buyer".to_string() }
}

type GetHandler = Box<dyn Fn(&[(String, String)]) -> (Duration, Result<Value, ClientError>) + Send + Sync>;
type WriteHandler = Box<dyn Fn(&str, &str, Option<&Value>) -> Result<Value, ClientError> + Send + Sync>;

/// Recorded request
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Scriptable in-memory HttpClient
pub struct MockHttpClient {
    calls: Mutex<Vec<Call>>,
    on_get: Mutex<GetHandler>,
    on_write: Mutex<WriteHandler>,
    write_delay: Mutex<Duration>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            on_get: Mutex::new(Box::new(|_: &[(String, String)]| (Duration::ZERO, Ok(Value::Array(vec![]))))),
            on_write: Mutex::new(Box::new(|_: &str, _: &str, body: Option<&Value>| Ok(body.cloned().unwrap_or(Value::Null)))),
            write_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn on_get<F>(&self, handler: F)
    where
        F: Fn(&[(String, String)]) -> (Duration, Result<Value, ClientError>) + Send + Sync + 'static,
    {
        *self.on_get.lock() = Box::new(handler);
    }

    /// Answer every GET with `body` immediately
    pub fn respond_get(&self, body: Value) {
        self.on_get(move |_| (Duration::ZERO, Ok(body.clone())));
    }

    pub fn on_write<F>(&self, handler: F)
    where
        F: Fn(&str, &str, Option<&Value>) -> Result<Value, ClientError> + Send + Sync + 'static,
    {
        *self.on_write.lock() = Box::new(handler);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }

    pub fn last(&self, method: &str) -> Option<Call> {
        self.calls.lock().iter().rev().find(|c| c.method == method).cloned()
    }

    fn record(&self, method: &str, path: &str, query: &[(String, String)], body: Option<&Value>) {
        self.calls.lock().push(Call {
            method: method.to_string(),
            path: path.to_string(),
            query: query.to_vec(),
            body: body.cloned(),
        });
    }

    async fn write(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        self.record(method, path, &[], body);
        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = (*self.on_write.lock())(method, path, body);
        result
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, ClientError> {
        self.record("GET", path, query, None);
        let (delay, result) = (*self.on_get.lock())(query);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.write("POST", path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.write("PATCH", path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.write("DELETE", path, None).await.map(|_| ())
    }
}

pub struct Harness {
    pub client: Arc<MockHttpClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: SyncContext,
}

pub fn harness() -> Harness {
    let client = Arc::new(MockHttpClient::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = SyncContext::new(
        client.clone(),
        Arc::new(RateLimiterRegistry::default()),
        notifier.clone(),
    );
    Harness { client, notifier, ctx }
}

pub fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Yield to spawned tasks until `condition` holds, bounded by `timeout`.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
