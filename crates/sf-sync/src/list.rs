//! ListSynchronizer - a paginated, searchable, server-backed collection
//!
//! State machine: `Idle → Loading → {Loaded | Failed} → Loading → …`
//!
//! Every parameter change (page, limit, search) and every `refetch` issues one
//! GET. Fetch failures are kept in the state and reported through the
//! notifier; they are never returned as errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sf_client::{HttpClient, ListResponse};
use sf_common::{
    Entity, EntityId, ListQuery, LoadState, Notification, Notifier, PageMeta, PageState, QueryKey,
    SyncError,
};
use sf_ratelimit::{BucketKind, RateLimiterRegistry};
use tracing::{debug, info, warn};

use crate::invalidation::{InvalidationBus, InvalidationSubscription};
use crate::SyncContext;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Configuration of one synchronized list
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Resource path, e.g. `/admin/users`
    pub endpoint: String,
    /// Invalidation key this list refetches on
    pub query_key: QueryKey,
    pub initial_search: String,
    pub page_size: u32,
    /// Jump back to page 1 when the search term changes
    pub reset_page_on_search: bool,
    /// Drop responses to requests that a newer request has superseded.
    /// When off, the last response to arrive wins.
    pub discard_superseded: bool,
}

impl ListOptions {
    pub fn new(endpoint: impl Into<String>, query_key: impl Into<QueryKey>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query_key: query_key.into(),
            initial_search: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            reset_page_on_search: false,
            discard_superseded: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.initial_search = search.into();
        self
    }

    pub fn reset_page_on_search(mut self, enabled: bool) -> Self {
        self.reset_page_on_search = enabled;
        self
    }

    pub fn discard_superseded(mut self, enabled: bool) -> Self {
        self.discard_superseded = enabled;
        self
    }
}

struct Inner<T> {
    client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiterRegistry>,
    notifier: Arc<dyn Notifier>,
    options: ListOptions,
    query: Mutex<ListQuery>,
    state: RwLock<PageState<T>>,
    /// Sequence number of the newest issued request
    issued: AtomicU64,
}

/// Server-backed list. Cloning yields another handle to the same list.
pub struct ListSynchronizer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ListSynchronizer<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> ListSynchronizer<T>
where
    T: Entity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create the list in `Idle` without fetching.
    pub fn new(ctx: &SyncContext, options: ListOptions) -> Self {
        let page_size = options.page_size.max(1);
        let mut query = ListQuery::new(page_size);
        query.search = options.initial_search.clone();

        Self {
            inner: Arc::new(Inner {
                client: ctx.client.clone(),
                limiter: ctx.limiter.clone(),
                notifier: ctx.notifier.clone(),
                options,
                query: Mutex::new(query),
                state: RwLock::new(PageState::new(page_size)),
                issued: AtomicU64::new(0),
            }),
        }
    }

    /// Create the list and load its first page.
    pub async fn open(ctx: &SyncContext, options: ListOptions) -> Self {
        let list = Self::new(ctx, options);
        list.fetch().await;
        list
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.options.endpoint
    }

    pub fn query_key(&self) -> &str {
        &self.inner.options.query_key
    }

    pub fn query(&self) -> ListQuery {
        self.inner.query.lock().clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner.state.read().items.clone()
    }

    pub fn meta(&self) -> PageMeta {
        self.inner.state.read().meta
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.state.read().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().is_loading()
    }

    pub fn error(&self) -> Option<SyncError> {
        self.inner.state.read().error().cloned()
    }

    pub fn snapshot(&self) -> PageState<T> {
        self.inner.state.read().clone()
    }

    pub async fn set_page(&self, page: u32) -> LoadState {
        self.inner.query.lock().page = page.max(1);
        self.fetch().await
    }

    pub async fn set_limit(&self, limit: u32) -> LoadState {
        self.inner.query.lock().limit = limit.max(1);
        self.fetch().await
    }

    pub async fn set_search(&self, search: impl Into<String>) -> LoadState {
        {
            let mut query = self.inner.query.lock();
            query.search = search.into();
            if self.inner.options.reset_page_on_search {
                query.page = 1;
            }
        }
        self.fetch().await
    }

    /// Fetch again with the current parameters.
    pub async fn refetch(&self) -> LoadState {
        self.fetch().await
    }

    async fn fetch(&self) -> LoadState {
        let inner = &self.inner;
        let seq = inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let query = inner.query.lock().clone();
        inner.state.write().state = LoadState::Loading;

        debug!(
            endpoint = %inner.options.endpoint,
            page = query.page,
            limit = query.limit,
            search = %query.search,
            seq = seq,
            "Fetching list page"
        );

        inner.limiter.acquire(BucketKind::Read, 1).await;
        let outcome = inner
            .client
            .get(&inner.options.endpoint, &query.to_query_pairs())
            .await
            .and_then(ListResponse::<T>::decode);

        if inner.options.discard_superseded && seq != inner.issued.load(Ordering::SeqCst) {
            debug!(endpoint = %inner.options.endpoint, seq = seq, "Discarding superseded list response");
            return self.load_state();
        }

        let failure = {
            let mut state = inner.state.write();
            match outcome {
                Ok(ListResponse::BareArray(items)) => {
                    state.meta = PageMeta::from_total(query.page, query.limit, items.len() as u64);
                    state.items = items;
                    state.state = LoadState::Loaded;
                    None
                }
                Ok(ListResponse::Enveloped { data, pagination }) => {
                    if let Some(wire) = pagination {
                        state.meta = wire.resolve(&query, data.len());
                    }
                    state.items = data;
                    state.state = LoadState::Loaded;
                    None
                }
                Err(e) => {
                    let err = SyncError::from(e);
                    state.items.clear();
                    state.state = LoadState::Failed(err.clone());
                    Some(err)
                }
            }
        };

        match failure {
            None => {
                debug!(endpoint = %inner.options.endpoint, seq = seq, "List page loaded");
                LoadState::Loaded
            }
            Some(err) => {
                warn!(
                    endpoint = %inner.options.endpoint,
                    kind = err.kind(),
                    error = %err,
                    "List fetch failed"
                );
                inner
                    .notifier
                    .notify(Notification::error("Failed to load data", err.user_message()));
                LoadState::Failed(err)
            }
        }
    }

    /// Merge the fields of `patch` into the local item with `id`. No request
    /// is made. Returns whether an item was updated.
    pub fn update_item(&self, id: &EntityId, patch: &Value) -> bool {
        let Value::Object(fields) = patch else {
            warn!(id = %id, "Ignoring non-object item patch");
            return false;
        };

        let mut state = self.inner.state.write();
        let Some(item) = state.items.iter_mut().find(|item| &item.id() == id) else {
            return false;
        };

        let merged = serde_json::to_value(&*item).and_then(|mut current| {
            if let Value::Object(ref mut map) = current {
                for (key, value) in fields {
                    map.insert(key.clone(), value.clone());
                }
            }
            serde_json::from_value::<T>(current)
        });

        match merged {
            Ok(updated) => {
                *item = updated;
                true
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Item patch does not fit the entity shape");
                false
            }
        }
    }

    /// Remove the local item with `id`. No request is made.
    pub fn delete_item(&self, id: &EntityId) -> bool {
        let mut state = self.inner.state.write();
        let before = state.items.len();
        state.items.retain(|item| &item.id() != id);
        state.items.len() != before
    }

    /// Refetch whenever `bus` carries this list's query key.
    pub fn subscribe(&self, bus: &InvalidationBus) -> InvalidationSubscription {
        let key = self.inner.options.query_key.clone();
        info!(query_key = %key, endpoint = %self.inner.options.endpoint, "List subscribed to invalidations");

        let list = self.clone();
        InvalidationSubscription::listen(bus, key, move || {
            let list = list.clone();
            async move {
                list.refetch().await;
            }
        })
    }
}
