//! Admin Data Synchronization
//!
//! This crate keeps admin views in sync with the remote API:
//! - ListSynchronizer: paginated, searchable, server-backed collections
//! - MutationDispatcher: sanitized, rate-limited create/update/delete
//! - InvalidationBus: "resource kind changed" signals from mutations to lists
//! - SyncContext: the shared client, rate limiter, notifier and bus

pub mod invalidation;
pub mod list;
pub mod mutation;

use std::sync::Arc;

use sf_client::HttpClient;
use sf_common::{Notifier, TracingNotifier};
use sf_ratelimit::RateLimiterRegistry;

pub use invalidation::{InvalidationBus, InvalidationSubscription};
pub use list::{ListOptions, ListSynchronizer};
pub use mutation::{MutationDispatcher, MutationOptions};

/// Collaborators shared by every list and dispatcher of one admin session
#[derive(Clone)]
pub struct SyncContext {
    pub client: Arc<dyn HttpClient>,
    pub limiter: Arc<RateLimiterRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub bus: InvalidationBus,
}

impl SyncContext {
    pub fn new(
        client: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiterRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            limiter,
            notifier,
            bus: InvalidationBus::default(),
        }
    }

    /// Default rate limits, notifications written to the log
    pub fn with_client(client: Arc<dyn HttpClient>) -> Self {
        Self::new(
            client,
            Arc::new(RateLimiterRegistry::default()),
            Arc::new(TracingNotifier),
        )
    }
}
