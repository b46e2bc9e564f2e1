//! MutationDispatcher - create/update/delete against one admin endpoint
//!
//! Every call runs the same pipeline:
//! sanitize → rate-limit (`write` bucket) → HTTP → invalidate → decode → notify.
//! Failures are reported through the notifier and then returned to the caller.
//! Calls are not queued; concurrent mutations race at the HTTP layer.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sf_client::{resource_path, HttpClient, ItemResponse};
use sf_common::{EntityId, Notification, Notifier, QueryKey, Result, SyncError};
use sf_ratelimit::{BucketKind, RateLimiterRegistry};
use sf_sanitize::{sanitize_email, sanitize_value, ArrayPolicy};
use tracing::{debug, info, warn};

use crate::invalidation::InvalidationBus;
use crate::SyncContext;

/// Configuration of a mutation dispatcher
#[derive(Debug, Clone)]
pub struct MutationOptions {
    /// Resource path, e.g. `/admin/users`
    pub endpoint: String,
    /// Query keys invalidated after every successful mutation
    pub invalidate: Vec<QueryKey>,
    /// Top-level payload fields validated as email addresses
    pub email_fields: Vec<String>,
    pub array_policy: ArrayPolicy,
    /// Human name of the entity used in notifications, e.g. "User"
    pub entity_label: String,
}

impl MutationOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            invalidate: Vec::new(),
            email_fields: Vec::new(),
            array_policy: ArrayPolicy::default(),
            entity_label: "Item".to_string(),
        }
    }

    pub fn invalidates(mut self, key: impl Into<QueryKey>) -> Self {
        self.invalidate.push(key.into());
        self
    }

    pub fn with_email_field(mut self, field: impl Into<String>) -> Self {
        self.email_fields.push(field.into());
        self
    }

    pub fn with_array_policy(mut self, policy: ArrayPolicy) -> Self {
        self.array_policy = policy;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.entity_label = label.into();
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum MutationKind {
    Create,
    Update,
    Remove,
}

impl MutationKind {
    fn verb(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Remove => "delete",
        }
    }

    fn past(&self) -> &'static str {
        match self {
            MutationKind::Create => "created",
            MutationKind::Update => "updated",
            MutationKind::Remove => "deleted",
        }
    }
}

/// Decrements the in-flight counter however the call ends
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MutationDispatcher<T> {
    client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiterRegistry>,
    notifier: Arc<dyn Notifier>,
    bus: InvalidationBus,
    options: MutationOptions,
    in_flight: Arc<AtomicUsize>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> MutationDispatcher<T>
where
    T: DeserializeOwned,
{
    pub fn new(ctx: &SyncContext, options: MutationOptions) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiter.clone(),
            notifier: ctx.notifier.clone(),
            bus: ctx.bus.clone(),
            options,
            in_flight: Arc::new(AtomicUsize::new(0)),
            _entity: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.options.endpoint
    }

    /// True while any mutation of this dispatcher is in flight
    pub fn is_mutating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// POST a sanitized `payload` and return the entity the server echoes.
    pub async fn create<P>(&self, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
    {
        let _guard = InFlightGuard::enter(&self.in_flight);
        let outcome = self.send_create(payload).await;
        self.finish(MutationKind::Create, outcome)
    }

    /// PATCH `endpoint/id` with a sanitized partial payload.
    pub async fn update<P>(&self, id: &EntityId, patch: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
    {
        let _guard = InFlightGuard::enter(&self.in_flight);
        let outcome = self.send_update(id, patch).await;
        self.finish(MutationKind::Update, outcome)
    }

    /// DELETE `endpoint/id`.
    pub async fn remove(&self, id: &EntityId) -> Result<()> {
        let _guard = InFlightGuard::enter(&self.in_flight);
        let outcome = self.send_remove(id).await;
        self.finish(MutationKind::Remove, outcome)
    }

    async fn send_create<P>(&self, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
    {
        let body = self.prepare(payload)?;
        self.limiter.acquire(BucketKind::Write, 1).await;
        debug!(endpoint = %self.options.endpoint, "Dispatching create");

        let response = self.client.post(&self.options.endpoint, &body).await?;
        self.written();
        Ok(ItemResponse::decode(response)?.into_inner())
    }

    async fn send_update<P>(&self, id: &EntityId, patch: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
    {
        let body = self.prepare(patch)?;
        self.limiter.acquire(BucketKind::Write, 1).await;
        let path = resource_path(&self.options.endpoint, id);
        debug!(path = %path, "Dispatching update");

        let response = self.client.patch(&path, &body).await?;
        self.written();
        Ok(ItemResponse::decode(response)?.into_inner())
    }

    async fn send_remove(&self, id: &EntityId) -> Result<()> {
        self.limiter.acquire(BucketKind::Write, 1).await;
        let path = resource_path(&self.options.endpoint, id);
        debug!(path = %path, "Dispatching delete");

        self.client.delete(&path).await?;
        self.written();
        Ok(())
    }

    /// The server accepted the write. Dependent lists refetch even if the
    /// response body turns out to be unusable.
    fn written(&self) {
        self.bus.invalidate(&self.options.invalidate);
    }

    /// Serialize and sanitize a payload, validating configured email fields.
    fn prepare<P>(&self, payload: &P) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        let raw = serde_json::to_value(payload)
            .map_err(|e| SyncError::validation(format!("Payload cannot be serialized: {}", e)))?;
        let mut body = sanitize_value(&raw, self.options.array_policy);

        if let Value::Object(ref mut map) = body {
            for field in &self.options.email_fields {
                if let Some(Value::String(email)) = map.get(field) {
                    let cleaned = sanitize_email(email)?;
                    map.insert(field.clone(), Value::String(cleaned));
                }
            }
        }

        Ok(body)
    }

    fn finish<R>(&self, kind: MutationKind, outcome: Result<R>) -> Result<R> {
        let label = &self.options.entity_label;

        match outcome {
            Ok(value) => {
                info!(
                    endpoint = %self.options.endpoint,
                    operation = kind.verb(),
                    "Mutation succeeded"
                );
                self.notifier.notify(Notification::success(
                    format!("{} {}", label, kind.past()),
                    format!("{} {} successfully", label, kind.past()),
                ));
                Ok(value)
            }
            Err(err) => {
                warn!(
                    endpoint = %self.options.endpoint,
                    operation = kind.verb(),
                    kind = err.kind(),
                    error = %err,
                    "Mutation failed"
                );
                self.notifier.notify(Notification::error(
                    format!("Failed to {} {}", kind.verb(), label.to_lowercase()),
                    err.user_message(),
                ));
                Err(err)
            }
        }
    }
}
