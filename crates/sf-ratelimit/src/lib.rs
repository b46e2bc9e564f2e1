//! Outbound Rate Limiting
//!
//! Token buckets gating calls to the admin API, one per operation class:
//! - `read`: list fetches (30 capacity, 30/sec)
//! - `write`: create/update/delete (10 capacity, 10/sec)
//! - `upload`: file uploads (5 capacity, 5/sec)
//!
//! Buckets never share tokens. A [`RateLimiterRegistry`] is built once and
//! handed to every synchronizer and dispatcher that should share it.

mod bucket;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bucket::{BucketStats, TokenBucket};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),
}

/// Operation class a call is throttled under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Read,
    Write,
    Upload,
}

impl BucketKind {
    pub const ALL: [BucketKind; 3] = [BucketKind::Read, BucketKind::Write, BucketKind::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Read => "read",
            BucketKind::Write => "write",
            BucketKind::Upload => "upload",
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketKind {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(BucketKind::Read),
            "write" => Ok(BucketKind::Write),
            "upload" => Ok(BucketKind::Upload),
            other => Err(RateLimitError::UnknownBucket(other.to_string())),
        }
    }
}

/// Capacity and refill rate of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub capacity: u32,
    pub refill_per_second: u32,
}

impl BucketConfig {
    pub const fn new(capacity: u32, refill_per_second: u32) -> Self {
        Self { capacity, refill_per_second }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub read: BucketConfig,
    pub write: BucketConfig,
    pub upload: BucketConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read: BucketConfig::new(30, 30),
            write: BucketConfig::new(10, 10),
            upload: BucketConfig::new(5, 5),
        }
    }
}

impl RateLimitConfig {
    pub fn get(&self, kind: BucketKind) -> BucketConfig {
        match kind {
            BucketKind::Read => self.read,
            BucketKind::Write => self.write,
            BucketKind::Upload => self.upload,
        }
    }
}

/// The three buckets shared by every list synchronizer and mutation dispatcher
pub struct RateLimiterRegistry {
    read: TokenBucket,
    write: TokenBucket,
    upload: TokenBucket,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            read: TokenBucket::new(BucketKind::Read, config.read),
            write: TokenBucket::new(BucketKind::Write, config.write),
            upload: TokenBucket::new(BucketKind::Upload, config.upload),
        }
    }

    pub fn bucket(&self, kind: BucketKind) -> &TokenBucket {
        match kind {
            BucketKind::Read => &self.read,
            BucketKind::Write => &self.write,
            BucketKind::Upload => &self.upload,
        }
    }

    /// Wait until `cost` tokens are available in `kind`, then take them.
    pub async fn acquire(&self, kind: BucketKind, cost: u32) {
        self.bucket(kind).acquire(cost).await
    }

    pub fn has_capacity(&self, kind: BucketKind, cost: u32) -> bool {
        self.bucket(kind).has_capacity(cost)
    }

    pub fn remaining_tokens(&self, kind: BucketKind) -> f64 {
        self.bucket(kind).remaining_tokens()
    }

    /// Take one token from `kind`, then run `call`. Its output is returned as is.
    pub async fn rate_limited_call<F, Fut, T>(&self, kind: BucketKind, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(kind, 1).await;
        call().await
    }

    pub fn stats(&self) -> Vec<BucketStats> {
        BucketKind::ALL.iter().map(|k| self.bucket(*k).stats()).collect()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_kind_parse() {
        assert_eq!("read".parse::<BucketKind>().unwrap(), BucketKind::Read);
        assert_eq!("WRITE".parse::<BucketKind>().unwrap(), BucketKind::Write);
        assert_eq!("upload".parse::<BucketKind>().unwrap(), BucketKind::Upload);
        assert_eq!(
            "delete".parse::<BucketKind>(),
            Err(RateLimitError::UnknownBucket("delete".to_string()))
        );
        assert_eq!(BucketKind::Upload.to_string(), "upload");
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.get(BucketKind::Read), BucketConfig::new(30, 30));
        assert_eq!(config.get(BucketKind::Write), BucketConfig::new(10, 10));
        assert_eq!(config.get(BucketKind::Upload), BucketConfig::new(5, 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_are_independent() {
        let registry = RateLimiterRegistry::default();
        for _ in 0..10 {
            registry.acquire(BucketKind::Write, 1).await;
        }

        assert!(!registry.has_capacity(BucketKind::Write, 1));
        assert_eq!(registry.remaining_tokens(BucketKind::Read), 30.0);
        assert_eq!(registry.remaining_tokens(BucketKind::Upload), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_propagates_result() {
        let registry = RateLimiterRegistry::default();

        let ok: Result<u32, String> = registry
            .rate_limited_call(BucketKind::Read, || async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = registry
            .rate_limited_call(BucketKind::Read, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(err, Err("boom".to_string()));

        assert!(registry.remaining_tokens(BucketKind::Read) <= 28.0 + 1e-6);
    }

    #[test]
    fn test_stats_cover_all_buckets() {
        let registry = RateLimiterRegistry::default();
        let stats = registry.stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].kind, BucketKind::Read);
        assert_eq!(stats[2].capacity, 5);
    }
}
