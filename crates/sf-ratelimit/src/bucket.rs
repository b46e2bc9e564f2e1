//! Token bucket with continuous refill

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::{BucketConfig, BucketKind};

/// Slack for float drift when comparing token counts
const EPSILON: f64 = 1e-9;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket. Starts full.
///
/// Zero capacities or refill rates are raised to 1 so that every `acquire`
/// can eventually succeed.
pub struct TokenBucket {
    kind: BucketKind,
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
    /// Serializes waiting acquirers (tokio's mutex is FIFO-fair)
    gate: tokio::sync::Mutex<()>,
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, Serialize)]
pub struct BucketStats {
    pub kind: BucketKind,
    pub capacity: u32,
    pub refill_per_second: u32,
    pub remaining_tokens: f64,
}

impl TokenBucket {
    pub fn new(kind: BucketKind, config: BucketConfig) -> Self {
        let capacity = config.capacity.max(1) as f64;
        Self {
            kind,
            capacity,
            refill_per_second: config.refill_per_second.max(1) as f64,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;
    }

    /// A request can never need more than a full bucket.
    fn clamp_cost(&self, cost: u32) -> f64 {
        (cost as f64).min(self.capacity)
    }

    /// Take `cost` tokens, or report how long until they will exist.
    fn try_take(&self, cost: f64) -> Result<(), Duration> {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens + EPSILON >= cost {
            state.tokens = (state.tokens - cost).max(0.0);
            return Ok(());
        }

        let deficit = cost - state.tokens;
        Err(Duration::from_secs_f64(deficit / self.refill_per_second))
    }

    /// Suspend until `cost` tokens are available, then deduct them.
    pub async fn acquire(&self, cost: u32) {
        let cost = self.clamp_cost(cost);
        let _turn = self.gate.lock().await;

        loop {
            match self.try_take(cost) {
                Ok(()) => return,
                Err(wait) => {
                    debug!(
                        bucket = %self.kind,
                        cost = cost,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, waiting for tokens"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Whether `cost` tokens could be taken right now. Does not consume.
    pub fn has_capacity(&self, cost: u32) -> bool {
        let cost = self.clamp_cost(cost);
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens + EPSILON >= cost
    }

    pub fn remaining_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn stats(&self) -> BucketStats {
        BucketStats {
            kind: self.kind,
            capacity: self.capacity as u32,
            refill_per_second: self.refill_per_second as u32,
            remaining_tokens: self.remaining_tokens(),
        }
    }
}
