//! Cache invalidation signals
//!
//! Mutation dispatchers publish the query keys they affect; list
//! synchronizers subscribed to a key refetch on their own.

use std::future::Future;

use sf_common::QueryKey;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<QueryKey>,
}

impl InvalidationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish each key. Having no subscribers is fine.
    pub fn invalidate(&self, keys: &[QueryKey]) {
        for key in keys {
            match self.tx.send(key.clone()) {
                Ok(receivers) => debug!(query_key = %key, receivers = receivers, "Invalidated query"),
                Err(_) => debug!(query_key = %key, "Invalidated query with no subscribers"),
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Background listener tied to a view's lifetime.
///
/// Dropping the subscription stops the listener from taking new
/// invalidations. A refetch that is already running completes and its result
/// is applied; the listener exits afterwards.
#[derive(Debug)]
pub struct InvalidationSubscription {
    handle: JoinHandle<()>,
    _shutdown: oneshot::Sender<()>,
}

impl InvalidationSubscription {
    /// Run `on_invalidate` once per received `key`. A lagged receiver runs it
    /// once instead of replaying what it missed.
    pub(crate) fn listen<F, Fut>(bus: &InvalidationBus, key: QueryKey, on_invalidate: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = bus.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    received = rx.recv() => received,
                };

                match received {
                    Ok(received) if received == key => {
                        debug!(query_key = %key, "Invalidation received, refetching");
                        on_invalidate().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(query_key = %key, skipped = skipped, "Invalidation receiver lagged, refetching");
                        on_invalidate().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(query_key = %key, "Invalidation listener stopped");
        });

        Self { handle, _shutdown: shutdown_tx }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}
